use crate::port::Port;

static LOGGER: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}

/// Pop every item visible in `cycle`, paired with that cycle.
pub fn drain<T>(port: &mut Port<T>, cycle: u64) -> Vec<(u64, T)> {
    std::iter::from_fn(|| port.pop(cycle))
        .map(|(item, _)| (cycle, item))
        .collect()
}
