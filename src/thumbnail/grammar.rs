use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ALLOWED_EXTENSIONS, FIXED_THUMB_SIZE, ThumbnailRequest, Variant};

struct Shape {
    variant: Variant,
    pattern: Regex,
}

/// Path shapes in match priority order
static SHAPES: LazyLock<Vec<Shape>> = LazyLock::new(|| {
    [
        (
            Variant::SizedPicture,
            r"^/(?P<id>[0-9]{1,6})/pictures/thumb/(?P<width>[0-9]{2,3})X-(?P<height>[0-9]{2,3})X-(?P<name>.*)\.(?P<ext>[A-Za-z]+)$",
        ),
        (
            Variant::LegacySizedPicture,
            r"^/(?P<id>[0-9]{1,6})/pictures/thumb/(?P<width>[0-9]{2,3})X-(?P<name>.*)\.(?P<ext>[A-Za-z]+)$",
        ),
        (
            Variant::FixedFileThumb,
            r"^/(?P<id>[0-9]{1,6})/dosyalar/_thumbs/(?P<name>.*)\.(?P<ext>[A-Za-z]+)$",
        ),
    ]
    .into_iter()
    .map(|(variant, pattern)| Shape {
        variant,
        pattern: Regex::new(pattern).expect("static thumbnail pattern"),
    })
    .collect()
});

/// Parses a decoded URL path into a [`ThumbnailRequest`].
///
/// Shapes are tried in fixed priority order and the first shape whose
/// pattern matches decides the outcome. Returns `None` when no shape matches,
/// or when the matching shape has a disallowed extension or a zero numeric field.
pub fn resolve(path: &str) -> Option<ThumbnailRequest> {
    let (shape, caps) = SHAPES
        .iter()
        .find_map(|shape| shape.pattern.captures(path).map(|caps| (shape, caps)))?;
    capture(shape, &caps)
}

fn capture(shape: &Shape, caps: &Captures<'_>) -> Option<ThumbnailRequest> {
    let extension = &caps["ext"];
    if !is_allowed_extension(extension) {
        return None;
    }

    let owner_id = parse_positive(&caps["id"])?;

    let (target_width, height) = match shape.variant {
        Variant::FixedFileThumb => (FIXED_THUMB_SIZE, Some(FIXED_THUMB_SIZE)),
        Variant::SizedPicture | Variant::LegacySizedPicture => {
            let width = parse_positive(&caps["width"])?;
            let height = match caps.name("height") {
                Some(m) => Some(parse_positive(m.as_str())?),
                None => None,
            };
            (width, height)
        }
    };

    Some(ThumbnailRequest {
        owner_id,
        variant: shape.variant,
        base_name: caps["name"].to_string(),
        extension: extension.to_string(),
        target_width,
        // Height mirrors width whenever the path omits it
        target_height: height.unwrap_or(target_width),
    })
}

fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
}

fn parse_positive(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_sized_picture() {
        let req = resolve("/123/pictures/thumb/200X-150X-cat.jpg").unwrap();
        assert_eq!(req.variant, Variant::SizedPicture);
        assert_eq!(req.owner_id, 123);
        assert_eq!(req.target_width, 200);
        assert_eq!(req.target_height, 150);
        assert_eq!(req.base_name, "cat");
        assert_eq!(req.extension, "jpg");
    }

    #[test]
    fn test_resolve_legacy_height_equals_width() {
        let req = resolve("/9/pictures/thumb/64X-dog.png").unwrap();
        assert_eq!(req.variant, Variant::LegacySizedPicture);
        assert_eq!(req.target_width, 64);
        assert_eq!(req.target_height, 64);
        assert_eq!(req.base_name, "dog");
    }

    #[test]
    fn test_resolve_fixed_thumb_ignores_path_content() {
        let req = resolve("/555/dosyalar/_thumbs/300X-300X-report.gif").unwrap();
        assert_eq!(req.variant, Variant::FixedFileThumb);
        assert_eq!(req.target_width, 100);
        assert_eq!(req.target_height, 100);
        assert_eq!(req.base_name, "300X-300X-report");
    }

    #[test]
    fn test_resolve_extension_case_insensitive() {
        let req = resolve("/1/pictures/thumb/50X-50X-photo.JPEG").unwrap();
        assert_eq!(req.extension, "JPEG");
        assert!(resolve("/1/pictures/thumb/50X-photo.WebP").is_some());
        assert!(resolve("/1/dosyalar/_thumbs/scan.Bmp").is_some());
    }

    #[test]
    fn test_resolve_keeps_inner_dots_in_name() {
        let req = resolve("/7/pictures/thumb/80X-my.holiday.photo.jfif").unwrap();
        assert_eq!(req.base_name, "my.holiday.photo");
        assert_eq!(req.extension, "jfif");
    }

    #[test]
    fn test_resolve_strips_leading_zeros_from_keys() {
        let req = resolve("/007/pictures/thumb/080X-090X-a.png").unwrap();
        assert_eq!(req.owner_id, 7);
        assert_eq!(req.cache_key(), "7/pictures/thumb/80X-90X-a.png");
    }

    #[test]
    fn test_resolve_priority_prefers_explicit_height() {
        // Also lexically valid as the width-only shape with name "100X-x"
        let req = resolve("/1/pictures/thumb/200X-100X-x.gif").unwrap();
        assert_eq!(req.variant, Variant::SizedPicture);
        assert_eq!(req.target_height, 100);
    }

    #[test]
    fn test_resolve_rejects_unknown_extension() {
        assert!(resolve("/1/pictures/thumb/200X-100X-x.txt").is_none());
        assert!(resolve("/1/pictures/thumb/200X-x.txt").is_none());
        assert!(resolve("/1/dosyalar/_thumbs/notes.txt").is_none());
    }

    #[test]
    fn test_resolve_rejects_malformed_paths() {
        assert!(resolve("/").is_none());
        assert!(resolve("/health").is_none());
        assert!(resolve("/1234567/pictures/thumb/200X-x.jpg").is_none());
        assert!(resolve("/1/pictures/thumb/5X-x.jpg").is_none());
        assert!(resolve("/1/pictures/thumb/2000X-x.jpg").is_none());
        assert!(resolve("/1/pictures/x.jpg").is_none());
        assert!(resolve("/abc/pictures/thumb/200X-x.jpg").is_none());
        assert!(resolve("1/pictures/thumb/200X-x.jpg").is_none());
    }

    #[test]
    fn test_resolve_rejects_zero_values() {
        assert!(resolve("/0/pictures/thumb/200X-x.jpg").is_none());
        assert!(resolve("/1/pictures/thumb/000X-x.jpg").is_none());
        assert!(resolve("/1/dosyalar/_thumbs/x.jpg").is_some());
    }

    #[test]
    fn test_resolve_zero_height_does_not_fall_through() {
        // The width-only shape would read this as name "000X-x"
        assert!(resolve("/1/pictures/thumb/200X-000X-x.jpg").is_none());
        assert!(resolve("/1/pictures/thumb/200X-000X-x.txt").is_none());
    }

    #[test]
    fn test_resolve_accepts_empty_name() {
        let req = resolve("/1/pictures/thumb/200X-.jpg").unwrap();
        assert_eq!(req.variant, Variant::LegacySizedPicture);
        assert_eq!(req.base_name, "");
        assert_eq!(req.source_key(), "1/pictures/.jpg");

        let req = resolve("/1/dosyalar/_thumbs/.png").unwrap();
        assert_eq!(req.cache_key(), "1/dosyalar/_thumbs/.png");
    }
}
