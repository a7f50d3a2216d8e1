//! Test infrastructure for the persistence layer.
//!
//! Fixtures, backend constructors and a single-slot test backend used to
//! observe connection reuse and cancellation.

#![allow(dead_code, unused_macros)]

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;

/// Instantiates async test functions against every backend.
///
/// Each listed function must be generic over `B: IsolationBackend` and take
/// an `IsolatedStore<B>`.
macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name($crate::common::memory_store()).await;
                }
            )*
        }

        #[cfg(feature = "sqlite")]
        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name($crate::common::sqlite_store()).await;
                }
            )*
        }
    };
}
