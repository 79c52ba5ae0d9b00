const RESPONSES_SEGMENT: &str = "/responses";

/// Moves a caller URL onto the backend base.
///
/// Everything after the `/responses` segment (sub-paths and query) is kept.
/// URLs without that segment keep their path, minus a leading `/v1`.
pub fn rewrite_url(original: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path_and_query(original);

    if let Some(suffix) = responses_suffix(path) {
        return format!("{base}{RESPONSES_SEGMENT}{suffix}");
    }

    let mut path = path.trim_start_matches('/');
    if path == "v1" || path.starts_with("v1/") || path.starts_with("v1?") {
        path = path.trim_start_matches("v1").trim_start_matches('/');
    }
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('?') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn path_and_query(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find(['/', '?']) {
                Some(path_start) => &rest[path_start..],
                None => "",
            }
        }
        None => url,
    }
}

fn responses_suffix(path: &str) -> Option<&str> {
    let (path_only, query) = match path.find('?') {
        Some(idx) => (&path[..idx], &path[idx..]),
        None => (path, ""),
    };
    let mut search_end = path_only.len();
    while let Some(idx) = path_only[..search_end].rfind(RESPONSES_SEGMENT) {
        let after = idx + RESPONSES_SEGMENT.len();
        let rest = &path_only[after..];
        if rest.is_empty() || rest.starts_with('/') {
            return Some(&path[after..after + rest.len() + query.len()]);
        }
        search_end = idx;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://chatgpt.com/backend-api/codex";

    #[test]
    fn rewrites_responses_endpoint() {
        assert_eq!(
            rewrite_url("https://api.openai.com/v1/responses", BASE),
            "https://chatgpt.com/backend-api/codex/responses"
        );
        assert_eq!(
            rewrite_url("http://127.0.0.1:8787/responses?stream=true", BASE),
            "https://chatgpt.com/backend-api/codex/responses?stream=true"
        );
    }

    #[test]
    fn keeps_sub_path_after_responses() {
        assert_eq!(
            rewrite_url("https://api.openai.com/v1/responses/resp_1/cancel", BASE),
            "https://chatgpt.com/backend-api/codex/responses/resp_1/cancel"
        );
    }

    #[test]
    fn does_not_match_longer_segments() {
        assert_eq!(
            rewrite_url("https://api.openai.com/v1/responses_archive", "https://x.test/"),
            "https://x.test/responses_archive"
        );
        assert_eq!(rewrite_url("/v1/models", BASE), format!("{BASE}/models"));
    }
}
