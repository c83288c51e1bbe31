use kubently_common::args::ApiKeyEntry;
use subtle::ConstantTimeEq;

/// Compares `candidate` against every configured key in constant time per
/// comparison. Bails out on length mismatch before the constant-time compare
/// (length itself is not considered secret), returning the matching entry's
/// identity if any.
pub fn check(keys: &[ApiKeyEntry], candidate: &str) -> Option<Option<String>> {
    let candidate_bytes = candidate.as_bytes();
    let mut matched = None;
    for entry in keys {
        let key_bytes = entry.key.as_bytes();
        if key_bytes.len() != candidate_bytes.len() {
            continue;
        }
        if bool::from(key_bytes.ct_eq(candidate_bytes)) {
            matched = Some(entry.identity.clone());
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_bare_key() {
        let keys = vec![ApiKeyEntry {
            identity: None,
            key: "k1".into(),
        }];
        assert_eq!(check(&keys, "k1"), Some(None));
        assert_eq!(check(&keys, "k2"), None);
    }

    #[test]
    fn matches_identity_key() {
        let keys = vec![ApiKeyEntry {
            identity: Some("admin".into()),
            key: "k1".into(),
        }];
        assert_eq!(check(&keys, "k1"), Some(Some("admin".into())));
    }
}
