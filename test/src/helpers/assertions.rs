/// Assert that a proxy's DataSet holds the expected value
#[macro_export]
macro_rules! assert_proxy_value {
    ($session:expr, $peer:expr, $field:ident, $expected:expr) => {
        assert_eq!(
            $session.proxy($peer).chunk.$field.get(),
            &$expected,
            "proxy {} has a stale `{}`",
            $peer,
            stringify!($field)
        );
    };
}

/// Assert that a chunk has no dirty state left to send
#[macro_export]
macro_rules! assert_settled {
    ($chunk:expr) => {
        let bits = $chunk.change_bits();
        assert!(
            replica_chunk::ChangeMask::is_clear(bits.reliable_dirty())
                && replica_chunk::ChangeMask::is_clear(bits.unreliable_dirty()),
            "chunk still dirty: {:?}",
            bits
        );
    };
}
