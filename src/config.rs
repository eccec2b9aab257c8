//! Configuration values
// (c) 2025 Ross Younger

/// Port configuration shared by both peers.
///
/// The two ports are well-known values agreed out of band. They are passed
/// explicitly into the channel-establishment operations rather than being
/// compiled-in globals, which is also what lets the tests run everything
/// on ephemeral ports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Configuration {
    /// The persistent control connection's port. The server listens here.
    pub control_port: u16,
    /// The per-operation data connections' port. The client listens here;
    /// the server connects back to it, FTP-active style.
    pub data_port: u16,
}

impl Configuration {
    /// Default control port.
    pub const DEFAULT_CONTROL_PORT: u16 = 7005;
    /// Default data port.
    pub const DEFAULT_DATA_PORT: u16 = 7006;
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            control_port: Self::DEFAULT_CONTROL_PORT,
            data_port: Self::DEFAULT_DATA_PORT,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::Configuration;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let c = Configuration::default();
        assert_eq!(c.control_port, 7005);
        assert_eq!(c.data_port, 7006);
    }
}
