use std::collections::HashMap;
use std::sync::Arc;

use super::*;

#[test]
fn visits_every_item_in_insertion_order() {
    let list = RotationList::new(vec!["a", "b", "c"]).unwrap();
    let visited: Vec<&str> = (0..3).map(|_| *list.next()).collect();
    assert_eq!(visited, vec!["a", "b", "c"]);
}

#[test]
fn wraps_around_after_size_calls() {
    let list = RotationList::new(vec![1, 2]).unwrap();
    list.next();
    list.next();
    assert_eq!(*list.next(), 1, "third call should repeat the first item");
}

#[test]
fn single_item_always_returned() {
    let list = RotationList::new(vec!["only"]).unwrap();
    for _ in 0..5 {
        assert_eq!(*list.next(), "only");
    }
}

#[test]
fn size_is_constant() {
    let list = RotationList::new(vec![1, 2, 3, 4]).unwrap();
    assert_eq!(list.size(), 4);
    for _ in 0..10 {
        list.next();
    }
    assert_eq!(list.size(), 4);
}

#[test]
fn rejects_empty_list() {
    let err = RotationList::<Endpoint>::new(vec![]).unwrap_err();
    assert!(matches!(err, ConfigError::NoEndpoints));
}

#[test]
fn concurrent_callers_share_positions_fairly() {
    let list = Arc::new(RotationList::new(vec![0usize, 1, 2]).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let list = Arc::clone(&list);
            std::thread::spawn(move || (0..300).map(|_| *list.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for h in handles {
        for idx in h.join().unwrap() {
            *counts.entry(idx).or_default() += 1;
        }
    }
    // 1200 calls over 3 items: every position is handed out exactly 400 times.
    assert_eq!(counts.get(&0), Some(&400));
    assert_eq!(counts.get(&1), Some(&400));
    assert_eq!(counts.get(&2), Some(&400));
}

#[test]
fn endpoint_without_scheme_gets_http() {
    let endpoint = Endpoint::parse("es1:9200").unwrap();
    assert_eq!(endpoint.as_str(), "http://es1:9200");
}

#[test]
fn endpoint_with_https_is_unchanged() {
    let endpoint = Endpoint::parse("https://es2:9200").unwrap();
    assert_eq!(endpoint.as_str(), "https://es2:9200");
}

#[test]
fn endpoint_with_http_is_unchanged() {
    let endpoint = Endpoint::parse("http://es3").unwrap();
    assert_eq!(endpoint.as_str(), "http://es3");
}

#[test]
fn endpoint_is_trimmed() {
    let endpoint = Endpoint::parse("  es1:9200 ").unwrap();
    assert_eq!(endpoint.as_str(), "http://es1:9200");
}

#[test]
fn endpoint_rejects_blank() {
    assert!(matches!(
        Endpoint::parse("  "),
        Err(ConfigError::InvalidEndpoint(_))
    ));
}

#[test]
fn endpoint_rejects_unparseable_address() {
    assert!(matches!(
        Endpoint::parse("es1:notaport"),
        Err(ConfigError::InvalidEndpoint(_))
    ));
}

#[test]
fn bulk_url_appends_bulk_path() {
    let endpoint = Endpoint::parse("es1:9200").unwrap();
    assert_eq!(endpoint.bulk_url(), "http://es1:9200/_bulk");
}

#[test]
fn trailing_slash_does_not_double_up() {
    let endpoint = Endpoint::parse("http://es1:9200/").unwrap();
    assert_eq!(endpoint.bulk_url(), "http://es1:9200/_bulk");
}

#[test]
fn scheme_match_ignores_case() {
    let endpoint = Endpoint::parse("HTTPS://es1:9200").unwrap();
    assert_eq!(endpoint.as_str(), "https://es1:9200");
    let endpoint = Endpoint::parse("Http://es2").unwrap();
    assert_eq!(endpoint.bulk_url(), "http://es2/_bulk");
}

#[test]
fn endpoint_rejects_other_schemes() {
    assert!(matches!(
        Endpoint::parse("ftp://es1"),
        Err(ConfigError::InvalidEndpoint(_))
    ));
}
