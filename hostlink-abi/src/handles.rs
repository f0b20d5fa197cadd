/// Sentinel handle for `undefined`. Also the "absent" value for optional returns.
pub const UNDEFINED: u32 = 0;
/// Sentinel handle for `null`.
pub const NULL: u32 = 1;
/// Sentinel handle for `true`.
pub const TRUE: u32 = 2;
/// Sentinel handle for `false`.
pub const FALSE: u32 = 3;

/// Number of sentinel handles at the bottom of every handle table.
pub const SENTINEL_COUNT: u32 = 4;

/// Default size of the permanently reserved low range, sentinels included.
pub const DEFAULT_RESERVED_SLOTS: u32 = 128;

/// True for the four sentinel handles.
pub fn is_sentinel(handle: u32) -> bool {
    handle < SENTINEL_COUNT
}

/// True when a handle stands for "no value" (`undefined` or `null`).
pub fn is_like_none(handle: u32) -> bool {
    handle == UNDEFINED || handle == NULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinct_and_low() {
        let all = [UNDEFINED, NULL, TRUE, FALSE];
        for (i, a) in all.iter().enumerate() {
            assert!(is_sentinel(*a));
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!is_sentinel(SENTINEL_COUNT));
        assert!(DEFAULT_RESERVED_SLOTS >= SENTINEL_COUNT);
    }

    #[test]
    fn test_like_none() {
        assert!(is_like_none(UNDEFINED));
        assert!(is_like_none(NULL));
        assert!(!is_like_none(TRUE));
        assert!(!is_like_none(DEFAULT_RESERVED_SLOTS));
    }
}
