// Text normalization - canonical matching forms for Vietnamese place names
// Every lookup in the reference index and every cascade tier compares these
// forms, never the raw scraped text.

// ============================================================================
// DIACRITIC FOLDING
// ============================================================================

/// Map one lowercase character to its base Latin letter.
///
/// Covers the full Vietnamese tone-mark/modifier table (the à/á/ạ/ả/ã and
/// â/ă families and their e/i/o/u/y equivalents) plus đ → d. Anything else
/// passes through untouched.
fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ'
        | 'ặ' | 'ẳ' | 'ẵ' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ'
        | 'ợ' | 'ở' | 'ỡ' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

/// Lowercase and strip diacritics, keeping all other characters as-is.
pub fn fold_diacritics(text: &str) -> String {
    text.to_lowercase().chars().map(fold_char).collect()
}

// ============================================================================
// NORMAL FORMS
// ============================================================================

/// Matching form for administrative units, station names and address text.
///
/// Lowercases, folds diacritics, collapses every run of non-alphanumeric
/// characters into a single space, and trims.
///
/// Idempotent: `normalize_unit(normalize_unit(x)) == normalize_unit(x)`.
///
/// Administrative prefixes ("Tỉnh", "Thành phố", "Quận", ...) are NOT
/// stripped here; prefix-insensitivity is a cascade concern (substring
/// containment), so exact match and prefix-insensitive match stay
/// distinguishable strategies.
///
/// # Example
/// ```
/// use busline_seeder::normalize::normalize_unit;
/// assert_eq!(normalize_unit("Đà Nẵng"), "da nang");
/// ```
pub fn normalize_unit(text: &str) -> String {
    collapse(&fold_diacritics(text), ' ')
}

/// URL-slug form: like `normalize_unit` but collapsing to hyphens.
pub fn normalize_slug(text: &str) -> String {
    collapse(&fold_diacritics(text), '-')
}

fn collapse(folded: &str, sep: char) -> String {
    let mut out = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(sep);
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

// ============================================================================
// ROUTE CODES
// ============================================================================

/// Max length of each half of a route code.
const ROUTE_CODE_HALF_LEN: usize = 10;

/// Derive a route code from origin and destination display text.
///
/// Each side is diacritic-folded, reduced to uppercase alphanumerics and
/// truncated to 10 characters; the halves are joined with `_`.
///
/// # Example
/// ```
/// use busline_seeder::normalize::route_code;
/// assert_eq!(route_code("Sài Gòn", "Đà Lạt"), "SAIGON_DALAT");
/// ```
pub fn route_code(origin: &str, destination: &str) -> String {
    format!("{}_{}", route_code_half(origin), route_code_half(destination))
}

fn route_code_half(text: &str) -> String {
    fold_diacritics(text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(ROUTE_CODE_HALF_LEN)
        .collect::<String>()
        .to_uppercase()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics() {
        assert_eq!(fold_diacritics("Đà Nẵng"), "da nang");
        assert_eq!(fold_diacritics("Hồ Chí Minh"), "ho chi minh");
        assert_eq!(fold_diacritics("Thừa Thiên Huế"), "thua thien hue");
        assert_eq!(fold_diacritics("Bà Rịa - Vũng Tàu"), "ba ria - vung tau");
        // Uppercase variants fold through the lowercase pass
        assert_eq!(fold_diacritics("ĐỒNG THÁP"), "dong thap");
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit("Đà Nẵng"), "da nang");
        assert_eq!(normalize_unit("Bà Rịa - Vũng Tàu"), "ba ria vung tau");
        assert_eq!(normalize_unit("  Quận 1,  TP.HCM "), "quan 1 tp hcm");
        assert_eq!(normalize_unit(""), "");
    }

    #[test]
    fn test_normalize_unit_keeps_admin_prefixes() {
        // Prefix-insensitivity belongs to the cascade, not the normalizer
        assert_eq!(normalize_unit("Tỉnh Tây Ninh"), "tinh tay ninh");
        assert_eq!(normalize_unit("Thành phố Cần Thơ"), "thanh pho can tho");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Đà Nẵng",
            "123 Nguyễn Huệ, Quận 1",
            "Bến xe Miền Đông",
            "   ",
            "Thị xã Trảng Bàng",
        ];
        for s in samples {
            let once = normalize_unit(s);
            assert_eq!(normalize_unit(&once), once, "unit form not stable: {s}");
            let slug = normalize_slug(s);
            assert_eq!(normalize_slug(&slug), slug, "slug form not stable: {s}");
        }
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("Bến xe Miền Đông"), "ben-xe-mien-dong");
        assert_eq!(normalize_slug("Sài Gòn / Đà Lạt"), "sai-gon-da-lat");
    }

    #[test]
    fn test_route_code() {
        assert_eq!(route_code("Sài Gòn", "Đà Lạt"), "SAIGON_DALAT");
        // Each half truncates to 10 alphanumerics
        assert_eq!(
            route_code("Thành phố Hồ Chí Minh", "Buôn Ma Thuột"),
            "THANHPHOHO_BUONMATHUO"
        );
        assert_eq!(route_code("Quận 1 - Hồ Chí Minh", "Cà Mau"), "QUAN1HOCHI_CAMAU");
    }
}
