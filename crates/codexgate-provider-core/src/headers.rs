pub type Headers = Vec<(String, String)>;

pub fn header_set(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
    headers.push((name, value.into()));
}

pub fn header_get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Removes every header with this name; returns the first removed value.
pub fn header_remove(headers: &mut Headers, name: &str) -> Option<String> {
    let mut removed = None;
    headers.retain(|(k, v)| {
        if !k.eq_ignore_ascii_case(name) {
            return true;
        }
        if removed.is_none() {
            removed = Some(v.clone());
        }
        false
    });
    removed
}
