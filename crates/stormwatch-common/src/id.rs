use snowflake::SnowflakeIdGenerator;
use std::sync::{Mutex, OnceLock};

static GENERATOR: OnceLock<Mutex<SnowflakeIdGenerator>> = OnceLock::new();

/// Pins the Snowflake machine/node identity for this process. Only the
/// first call wins; later calls (e.g. from parallel tests) are no-ops.
/// Both identifiers must be in `0..=31`.
pub fn configure(machine_id: i32, node_id: i32) {
    let _ = GENERATOR.set(Mutex::new(SnowflakeIdGenerator::new(machine_id, node_id)));
}

/// A fresh Snowflake ID, rendered as a decimal string (rules and
/// delivery records key on these). Falls back to identity `1/1` when
/// [`configure`] was never called.
pub fn next_id() -> String {
    let generator = GENERATOR.get_or_init(|| Mutex::new(SnowflakeIdGenerator::new(1, 1)));
    let mut generator = generator
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    generator.real_time_generate().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_decimal_strings() {
        configure(2, 3);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = next_id();
            assert!(id.parse::<i64>().is_ok(), "not a decimal i64: {id}");
            assert!(seen.insert(id), "generator repeated an ID");
        }
    }

    #[test]
    fn reconfigure_is_ignored_after_first_use() {
        configure(4, 4);
        let before = next_id();
        configure(9, 9);
        let after = next_id();
        assert!(before.parse::<i64>().is_ok());
        assert!(after.parse::<i64>().is_ok());
        assert_ne!(before, after);
    }
}
