//! MIME type resolution for uploaded files.
//!
//! The filename extension is authoritative when it maps to a known type;
//! otherwise the first bytes of the content are sniffed for magic signatures.

/// Number of leading bytes the sniffer looks at.
pub const HEADER_SNIFF_LEN: usize = 512;

/// Resolved type for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffedType {
    pub mime_type: String,
    /// Lowercased canonical extension without the leading dot; empty when
    /// neither the filename nor the content gave one.
    pub extension: String,
}

/// Determine the MIME type and canonical extension for a file.
///
/// `head` is the first (up to [`HEADER_SNIFF_LEN`]) bytes of the content.
pub fn resolve_type(name: &str, head: &[u8]) -> SniffedType {
    let extension = extension_of(name);

    if !extension.is_empty() {
        if let Some(mime) = mime_guess::from_ext(&extension).first() {
            return SniffedType {
                mime_type: mime.essence_str().to_string(),
                extension,
            };
        }
    }

    if let Some(kind) = infer::get(head) {
        return SniffedType {
            mime_type: kind.mime_type().to_string(),
            extension: if extension.is_empty() {
                kind.extension().to_string()
            } else {
                extension
            },
        };
    }

    SniffedType {
        mime_type: "application/octet-stream".to_string(),
        extension,
    }
}

/// Lowercased extension of a filename, without the leading dot.
pub fn extension_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("test.PNG"), "png");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn test_extension_wins_over_content() {
        // PNG magic bytes but a .jpg name: the extension is authoritative.
        let png_head = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let sniffed = resolve_type("photo.jpg", &png_head);
        assert_eq!(sniffed.mime_type, "image/jpeg");
        assert_eq!(sniffed.extension, "jpg");
    }

    #[test]
    fn test_content_sniff_fallback() {
        let png_head = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let sniffed = resolve_type("upload", &png_head);
        assert_eq!(sniffed.mime_type, "image/png");
        assert_eq!(sniffed.extension, "png");
    }

    #[test]
    fn test_unknown_extension_sniffs_content() {
        let gif_head = b"GIF89a\x01\x00\x01\x00";
        let sniffed = resolve_type("file.weirdext", gif_head);
        assert_eq!(sniffed.mime_type, "image/gif");
        // The client-supplied extension is kept once lowercased.
        assert_eq!(sniffed.extension, "weirdext");
    }

    #[test]
    fn test_octet_stream_fallback() {
        let sniffed = resolve_type("blob", b"\x00\x01\x02\x03");
        assert_eq!(sniffed.mime_type, "application/octet-stream");
        assert_eq!(sniffed.extension, "");
    }

    #[test]
    fn test_text_extension() {
        let sniffed = resolve_type("notes.txt", b"just some text");
        assert_eq!(sniffed.mime_type, "text/plain");
        assert_eq!(sniffed.extension, "txt");
    }
}
