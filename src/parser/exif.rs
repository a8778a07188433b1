use exif::{Field, In, Reader, Value};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Decodes the EXIF tags embedded in an image. Images without EXIF, or
/// that fail to parse, give an empty map.
pub fn read_metadata(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!("No EXIF decoded: {}", e);
            return metadata;
        }
    };

    for field in exif.fields() {
        metadata.insert(field_key(field), field_value(field));
    }
    metadata
}

fn field_key(field: &Field) -> String {
    if field.ifd_num == In::THUMBNAIL {
        format!("thumbnail.{}", field.tag)
    } else {
        field.tag.to_string()
    }
}

fn field_value(field: &Field) -> String {
    match &field.value {
        Value::Undefined(bytes, _) | Value::Byte(bytes) => hex::encode(bytes),
        Value::Ascii(parts) => parts
            .iter()
            .map(|part| String::from_utf8_lossy(part).trim_end_matches('\0').trim().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        _ => field.display_value().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::jpeg_with_make;
    use exif::Tag;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_ascii_tags() {
        let metadata = read_metadata(&jpeg_with_make("Canon", "EOS 5D"));

        assert_eq!(metadata.get("Make").map(String::as_str), Some("Canon"));
        assert_eq!(metadata.get("Model").map(String::as_str), Some("EOS 5D"));
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_corrupt_image_gives_empty_map() {
        assert!(read_metadata(b"\xFF\xD8garbage").is_empty());
        assert!(read_metadata(b"GIF89a").is_empty());
        assert!(read_metadata(&[]).is_empty());
    }

    #[test]
    fn test_binary_values_are_hex() {
        let field = Field {
            tag: Tag::ExifVersion,
            ifd_num: In::PRIMARY,
            value: Value::Undefined(b"0230".to_vec(), 0),
        };
        assert_eq!(field_value(&field), "30323330");
    }

    #[test]
    fn test_thumbnail_tags_are_prefixed() {
        let field = Field {
            tag: Tag::Make,
            ifd_num: In::THUMBNAIL,
            value: Value::Ascii(vec![b"Canon".to_vec()]),
        };
        assert_eq!(field_key(&field), "thumbnail.Make");
        assert_eq!(field_value(&field), "Canon");
    }
}
