//! Common utilities shared by the WebDAV client and the command-line binary

/// Build a standardized User-Agent string for all WebDAV requests
pub fn build_user_agent() -> String {
    format!("webdav-client/{} (+https://crates.io/crates/webdav-client)",
            env!("CARGO_PKG_VERSION"))
}

/// Size of the buffer used when streaming local files into PUT bodies.
pub const UPLOAD_CHUNK_SIZE: usize = 10_000;

/// Last non-empty segment of a slash-separated path.
///
/// Input:  "/remote.php/dav/files/demo/Photos/"
/// Output: "Photos"
pub fn last_path_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_format() {
        let user_agent = build_user_agent();
        assert!(user_agent.starts_with("webdav-client/"));
        assert!(user_agent.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("/dav/files/demo/Photos/"), "Photos");
        assert_eq!(last_path_segment("/dav/files/demo/Photos/lake.jpg"), "lake.jpg");
        assert_eq!(last_path_segment("report.pdf"), "report.pdf");
        assert_eq!(last_path_segment("/"), "");
        assert_eq!(last_path_segment(""), "");
    }
}
