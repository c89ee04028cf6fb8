//! Module command puts all the APDUs of a key import together and renders them as the
//! arguments of the card tool.
//!

use std::fmt;

use tracing::{debug, info};

use crate::apdus::{self, APDU, DEFAULT_CHUNK_SIZE};
use crate::errors::Result;
use crate::keys::{Fingerprint, KeyMaterial, KeySlot};
use crate::template;
use crate::tlvs;

/// Configuration options for building the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Data bytes per chained key import APDU, at most 255.
    pub chunk_size: usize,
    /// The program which talks to the card.
    pub tool: String,
    /// The option of `tool` which sends one APDU.
    pub send_flag: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tool: String::from("opensc-tool"),
            send_flag: String::from("-s"),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tool = tool.to_string();
        self
    }

    pub fn with_send_flag(mut self, send_flag: &str) -> Self {
        self.send_flag = send_flag.to_string();
        self
    }

    /// Checks that the chunk size fits in the length byte of an APDU.
    pub fn validate(&self) -> Result<()> {
        apdus::check_chunk_size(self.chunk_size)
    }
}

/// The APDUs of a key import, in the order the card must get them, ready to be printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    tool: String,
    send_flag: String,
    apdus: Vec<Vec<u8>>,
}

impl RenderedCommand {
    /// Collects the fragments of `apdus`, keeping their order.
    pub fn new(config: &Config, apdus: &[APDU]) -> Self {
        RenderedCommand {
            tool: config.tool.clone(),
            send_flag: config.send_flag.clone(),
            apdus: apdus.iter().flat_map(|apdu| apdu.iapdus()).collect(),
        }
    }

    /// Raw bytes of every APDU.
    pub fn apdus(&self) -> &[Vec<u8>] {
        &self.apdus[..]
    }

    /// Every APDU as a single quoted hex string, `'00 A4 04 00 ...'`.
    pub fn quoted(&self) -> Vec<String> {
        self.apdus
            .iter()
            .map(|apdu| format!("'{}'", tlvs::hexify(apdu)))
            .collect()
    }

    /// The arguments for the tool, the send flag before every APDU.
    pub fn arguments(&self) -> Vec<String> {
        self.quoted()
            .into_iter()
            .flat_map(|apdu| vec![self.send_flag.clone(), apdu])
            .collect()
    }

    /// The whole shell command line.
    pub fn to_command_line(&self) -> String {
        let mut parts = vec![self.tool.clone()];
        parts.extend(self.arguments());
        parts.join(" ")
    }
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Builds every APDU needed to import `key` into `slot`: select the OpenPGP application,
/// verify the admin `pin`, import the key and store its `fingerprint`.
///
/// # Example
///
/// ```
/// let command = build_command(&Config::default(), &key, KeySlot::Signing, "12345678", &fingerprint)?;
/// println!("{}", command);
/// ```
pub fn build_command(
    config: &Config,
    key: &KeyMaterial,
    slot: KeySlot,
    pin: &str,
    fingerprint: &Fingerprint,
) -> Result<RenderedCommand> {
    config.validate()?;

    let select = apdus::create_apdu_select_openpgp();
    let verify = apdus::create_apdu_verify_pw3(pin)?;
    let body = template::build_key_import(key, slot)?;
    let import = apdus::create_apdu_key_import(body, config.chunk_size)?;
    let put_fingerprint = apdus::create_apdu_put_fingerprint(slot, fingerprint)?;
    debug!(
        ?slot,
        fragments = import.fragments.len(),
        "built key import"
    );

    let command = RenderedCommand::new(config, &[select, verify, import, put_fingerprint]);
    info!(apdus = command.apdus().len(), "rendered key import command");
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KeyToSCError;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.tool, "opensc-tool");
        assert_eq!(config.send_flag, "-s");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::new().with_chunk_size(0).validate(),
            Err(KeyToSCError::InvalidChunkSize(0))
        ));
        assert!(Config::new().with_chunk_size(300).validate().is_err());
    }

    #[test]
    fn test_rendering() {
        let config = Config::new().with_tool("gp").with_send_flag("-a");
        let command = RenderedCommand::new(&config, &[apdus::create_apdu_select_openpgp()]);
        assert_eq!(command.quoted(), vec!["'00 A4 04 00 06 D2 76 00 01 24 01'"]);
        assert_eq!(
            command.arguments(),
            vec!["-a", "'00 A4 04 00 06 D2 76 00 01 24 01'"]
        );
        assert_eq!(
            command.to_string(),
            "gp -a '00 A4 04 00 06 D2 76 00 01 24 01'"
        );
    }
}
