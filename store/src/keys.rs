//! Composite key helpers.

use crate::StoreError;

/// `len(bytes) ‖ bytes` with a single length byte. Keeps composite keys
/// unambiguous when one component is a prefix of another.
pub fn length_prefixed(bytes: &[u8]) -> Result<Vec<u8>, StoreError> {
    let len = u8::try_from(bytes.len())
        .map_err(|_| StoreError::Backend(format!("key component of {} bytes", bytes.len())))?;
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Smallest key greater than every key starting with `prefix`, or `None` when
/// the prefix is all `0xff` (iteration runs to the end).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix() {
        assert_eq!(length_prefixed(&[7, 8]).unwrap(), vec![2, 7, 8]);
        assert_eq!(length_prefixed(&[]).unwrap(), vec![0]);
        assert!(length_prefixed(&[0u8; 256]).is_err());
    }

    #[test]
    fn prefix_end_cases() {
        assert_eq!(prefix_end(&[0x01]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }
}
