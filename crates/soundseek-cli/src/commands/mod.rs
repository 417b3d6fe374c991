pub mod config;
pub mod evaluate;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod process;
pub mod search;
pub mod status;

pub use evaluate::run_evaluate;
pub use extract::run_extract;
pub use fetch::run_fetch;
pub use index::run_index;
pub use process::run_process;
pub use search::run_search;
pub use status::show_status;

use soundseek_search::Normalization;

/// Map the `--normalize` flag to an index normalisation.
pub const fn normalization(normalize: bool) -> Normalization {
    if normalize {
        Normalization::ZScore
    } else {
        Normalization::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flag() {
        assert_eq!(normalization(false), Normalization::None);
        assert_eq!(normalization(true), Normalization::ZScore);
    }
}
