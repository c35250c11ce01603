//! Network operators (@ipMatch, @ipMatchFromFile).

use ipnetwork::IpNetwork;
use std::net::IpAddr;

use super::traits::{data_lines, Operator, OperatorOptions};
use crate::engine::TransactionState;
use crate::error::{Error, Result};

/// Matches addresses against a list of IPs and CIDR blocks.
#[derive(Debug, Clone)]
pub struct IpMatchOperator {
    networks: Vec<IpNetwork>,
}

/// Parse an address or network. Bare addresses become /32 or /128.
fn parse_network(s: &str) -> Result<IpNetwork> {
    let parsed = if s.contains('/') {
        s.parse::<IpNetwork>().map_err(|e| e.to_string())
    } else {
        s.parse::<IpAddr>()
            .map(IpNetwork::from)
            .map_err(|e| e.to_string())
    };
    parsed.map_err(|message| Error::InvalidIp {
        value: s.to_string(),
        message,
    })
}

impl IpMatchOperator {
    /// Build from addresses separated by commas or whitespace.
    pub fn new(list: &str) -> Result<Self> {
        let networks = list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(parse_network)
            .collect::<Result<Vec<_>>>()?;
        if networks.is_empty() {
            return Err(Error::InvalidIp {
                value: list.to_string(),
                message: "empty address list".to_string(),
            });
        }
        Ok(Self { networks })
    }

    /// `@ipMatch` factory.
    pub fn from_options(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self::new(&options.arguments)?))
    }

    /// `@ipMatchFromFile` factory: one address or network per line.
    pub fn from_file(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        let content = options.read_data_file(&options.arguments)?;
        let networks = data_lines(&content)
            .map(parse_network)
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Self { networks }))
    }

    fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }
}

impl Operator for IpMatchOperator {
    fn evaluate(&self, _tx: &mut dyn TransactionState, value: &str) -> bool {
        value
            .trim()
            .parse::<IpAddr>()
            .map(|ip| self.contains(ip))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;
    use crate::fs::EmbeddedFileSystem;
    use std::sync::Arc;

    fn matches(op: &IpMatchOperator, value: &str) -> bool {
        op.evaluate(&mut TestState::default(), value)
    }

    #[test]
    fn test_ip_match_single() {
        let op = IpMatchOperator::new("192.168.1.1").unwrap();
        assert!(matches(&op, "192.168.1.1"));
        assert!(!matches(&op, "192.168.1.2"));
    }

    #[test]
    fn test_ip_match_cidr() {
        let op = IpMatchOperator::new("192.168.1.0/24").unwrap();
        assert!(matches(&op, "192.168.1.1"));
        assert!(matches(&op, "192.168.1.255"));
        assert!(!matches(&op, "192.168.2.1"));
    }

    #[test]
    fn test_ip_match_comma_list_and_v6() {
        let op = IpMatchOperator::new("10.0.0.0/8,192.168.0.0/16, ::1").unwrap();
        assert!(matches(&op, "10.1.2.3"));
        assert!(matches(&op, "::1"));
        assert!(!matches(&op, "172.16.0.1"));
        assert!(!matches(&op, "not-an-ip"));
    }

    #[test]
    fn test_ip_match_invalid() {
        assert!(matches!(
            IpMatchOperator::new("10.0.0.300"),
            Err(Error::InvalidIp { .. })
        ));
    }

    #[test]
    fn test_ip_match_from_file() {
        let mut options = OperatorOptions::new("blocked.txt");
        options.root = Arc::new(
            EmbeddedFileSystem::new().with_file("blocked.txt", "# bad actors\n203.0.113.0/24\n"),
        );
        let op = IpMatchOperator::from_file(&options).unwrap();
        assert!(op.evaluate(&mut TestState::default(), "203.0.113.9"));
    }
}
