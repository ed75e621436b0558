use ::url::form_urlencoded;

/// Appends `params` as a query string to `base`. Relative bases are allowed.
/// With no params the base is returned unchanged.
pub fn to_url<K, V>(base: &str, params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (name, value) in params {
        serializer.append_pair(name.as_ref(), value.as_ref());
        any = true;
    }
    if !any {
        return base.to_string();
    }
    let query = serializer.finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}
