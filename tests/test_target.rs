use interposer::http::target::{ParsedQuery, RequestTarget, path_segments};

#[test]
fn test_segments_drop_empty() {
    let target = RequestTarget::parse("/a//b/");
    assert_eq!(target.segments(), vec!["a", "b"]);
    assert!(RequestTarget::parse("/").segments().is_empty());
}

#[test]
fn test_segments_are_not_decoded() {
    assert_eq!(path_segments("/users/a%20b"), vec!["users", "a%20b"]);
}

#[test]
fn test_query_pairs_in_order() {
    let query = RequestTarget::parse("/users?k1=v1&k2=v2").query_pairs();

    assert_eq!(query.keys, vec!["k1", "k2"]);
    assert_eq!(query.values, vec!["v1", "v2"]);
    assert_eq!(query.get("k2"), Some("v2"));
}

#[test]
fn test_no_query_is_empty() {
    let target = RequestTarget::parse("/users");

    assert_eq!(target.query(), None);
    assert_eq!(target.query_pairs(), ParsedQuery::default());
}

#[test]
fn test_query_values_are_decoded() {
    let query = ParsedQuery::parse("name=John+Doe&city=New%20York&flag");

    assert_eq!(query.get("name"), Some("John Doe"));
    assert_eq!(query.get("city"), Some("New York"));
    assert_eq!(query.get("flag"), Some(""));
}

#[test]
fn test_repeated_keys_are_joined() {
    let query = ParsedQuery::parse("tag=a&page=1&tag=b");

    assert_eq!(query.values, vec!["a,b", "1"]);
    assert_eq!(query.keys, vec!["tag", "page"]);
    assert_eq!(query.get("tag"), Some("a,b"));
}

#[test]
fn test_absolute_form_target() {
    let target = RequestTarget::parse("http://example.com:8081/api/items?id=3");

    assert_eq!(target.path(), "/api/items");
    assert_eq!(target.segments(), vec!["api", "items"]);
    assert_eq!(target.query_pairs().get("id"), Some("3"));
    assert_eq!(target.path_and_query(), "/api/items?id=3");
    assert_eq!(target.as_str(), "http://example.com:8081/api/items?id=3");
}

#[test]
fn test_path_and_query_defaults_to_root() {
    assert_eq!(RequestTarget::parse("").path_and_query(), "/");
    assert_eq!(RequestTarget::parse("?a=1").path_and_query(), "/?a=1");
}

#[test]
fn test_script_detection() {
    assert!(RequestTarget::parse("/static/app.js").is_script());
    assert!(RequestTarget::parse("/bundle.js?v=3").is_script());
    assert!(RequestTarget::parse("/data.json").is_script());
    assert!(!RequestTarget::parse("/index.html").is_script());
}
