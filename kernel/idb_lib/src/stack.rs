//! Stack growth for recursive walks over the ID graph.
//!
//! Dependency chains between IDs have no depth limit (long parent chains,
//! deeply nested node groups), so recursive walks over them grow the stack on
//! demand instead of overflowing it.

/// Grow the stack when less than this remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the stack if the red zone is reached.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_chain_does_not_overflow() {
        fn chain_depth(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { chain_depth(n - 1) + 1 })
        }

        assert_eq!(chain_depth(100_000), 100_000);
    }
}
