//! Register map and value interpretation
//!
//! Device state is exposed as one-byte register addresses, read with
//! `0xAA` and written with `0x33`. A few registers fan out into
//! sub-registers addressed by a second byte. The map is empirical and
//! incomplete: registers without a known layout stay readable as raw
//! bytes via [`RegisterValue::Opaque`], never rejected.

use crate::types::ProtocolError;

/// Power register. 0x01 is on, anything else is off. The device
/// normalizes out-of-range writes silently.
pub const REG_POWER: u8 = 0x01;
/// Dimmer register, whole-light brightness in percent.
pub const REG_DIMMER: u8 = 0x04;
/// Mode register. One layout per mode tag.
pub const REG_MODE: u8 = 0x05;
/// Hardware version string.
pub const REG_VERSION: u8 = 0x06;
/// Information multi-register (sub-addressed).
pub const REG_INFO: u8 = 0x07;
/// Restart register. Writing a reason restarts the light. Write-only.
pub const REG_RESTART: u8 = 0x0e;
/// Power-on memory flag.
pub const REG_POWER_MEMORY: u8 = 0x0f;
/// Sleep timer settings.
pub const REG_SLEEP: u8 = 0x11;
/// Wake timer settings.
pub const REG_WAKE: u8 = 0x12;
/// Alarm settings.
pub const REG_ALARM: u8 = 0x23;
/// Color buffer multi-register (sub-addressed). Each sub-register
/// holds three brightness+RGB units. Units retain garbage from
/// previous commands unless overwritten.
pub const REG_BUFFER: u8 = 0xa5;

/// MAC address in little-endian plus two unknown bytes.
pub const SUB_INFO_MAC_UNK: u8 = 0x02;
/// Hardware version info sub-register.
pub const SUB_INFO_HWVER: u8 = 0x03;
/// Firmware version info sub-register.
pub const SUB_INFO_FWVER: u8 = 0x04;
/// MAC address in little-endian.
pub const SUB_INFO_MAC: u8 = 0x06;

/// Mode register scene tag, followed by a 2-byte LE scene code.
pub const MODE_SCENE: u8 = 0x04;
/// Mode register mic/music tag.
pub const MODE_MIC: u8 = 0x13;
/// Mode register segment tag. Write-only: reads report only the tag.
pub const MODE_SEGMENT: u8 = 0x15;
/// Segment command for setting color.
pub const SEGMENT_COLOR: u8 = 0x01;
/// Segment command for setting brightness.
pub const SEGMENT_BRIGHT: u8 = 0x02;

/// Number of discrete segments in the light.
pub const SEGMENT_COUNT: usize = 15;
/// Offset of the first segment in the color buffer.
pub const SEGMENT_OFFSET: usize = 3;
/// Color units per buffer sub-register.
pub const UNITS_PER_PAGE: usize = 3;
/// Bytes in one buffer sub-register.
pub const PAGE_SIZE: usize = 12;

/// Maximum dimmer / brightness percentage.
pub const MAX_PERCENT: u8 = 100;

/// Lowest color temperature the device accepts, in kelvin.
pub const MIN_TEMP: u16 = 2000;
/// Highest color temperature the device accepts, in kelvin.
pub const MAX_TEMP: u16 = 8800;

/// Registers whose acknowledgements echo a sub-register byte
#[must_use]
pub fn has_subregisters(register: u8) -> bool {
    matches!(register, REG_INFO | REG_BUFFER)
}

/// A register address, optionally sub-addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub register: u8,
    pub sub: Option<u8>,
}

impl Register {
    pub const POWER: Register = Register::plain(REG_POWER);
    pub const DIMMER: Register = Register::plain(REG_DIMMER);
    pub const MODE: Register = Register::plain(REG_MODE);
    pub const VERSION: Register = Register::plain(REG_VERSION);
    pub const RESTART: Register = Register::plain(REG_RESTART);
    pub const HWVER: Register = Register::sub(REG_INFO, SUB_INFO_HWVER);
    pub const FWVER: Register = Register::sub(REG_INFO, SUB_INFO_FWVER);
    pub const MAC: Register = Register::sub(REG_INFO, SUB_INFO_MAC);

    #[must_use]
    pub const fn plain(register: u8) -> Self {
        Self { register, sub: None }
    }

    #[must_use]
    pub const fn sub(register: u8, sub: u8) -> Self {
        Self {
            register,
            sub: Some(sub),
        }
    }

    /// Color buffer page holding three color units
    #[must_use]
    pub const fn buffer_page(page: u8) -> Self {
        Self::sub(REG_BUFFER, page)
    }

    /// Address bytes as they appear after the command byte
    #[must_use]
    pub fn address_bytes(&self) -> Vec<u8> {
        match self.sub {
            Some(sub) => vec![self.register, sub],
            None => vec![self.register],
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sub {
            Some(sub) => write!(f, "{:#04x}/{:#04x}", self.register, sub),
            None => write!(f, "{:#04x}", self.register),
        }
    }
}

/// Brightness plus RGB, the unit the color buffer is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argb {
    pub brightness: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One 4-byte slot of a color buffer page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUnit {
    /// The `xx 01 01 01` sentinel: no command has set this slot
    Undefined,
    Color(Argb),
}

impl BufferUnit {
    /// Decode a 4-byte buffer slot, mapping the sentinel to Undefined
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        if bytes[1..] == [0x01, 0x01, 0x01] {
            BufferUnit::Undefined
        } else {
            BufferUnit::Color(Argb {
                brightness: bytes[0],
                r: bytes[1],
                g: bytes[2],
                b: bytes[3],
            })
        }
    }
}

/// Contents of one color buffer sub-register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferPage {
    /// Page 0x00: current color followed by a little-endian color
    /// temperature in kelvin, meaningful in color-temperature mode.
    Status { color: BufferUnit, temperature: u16 },
    /// Any other page: three color units.
    Colors([BufferUnit; 3]),
}

/// Decoded content of the mode register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Scene animation identified by a 2-byte code. Code zero means
    /// "whatever is loaded in the color buffer"; callers resolve it
    /// by reading the buffer, it is not an error.
    Scene { code: u16 },
    /// Mic/music reactive mode. Parameters beyond the music-mode code
    /// are not mapped and kept raw.
    Mic { music_mode: u8, params: Vec<u8> },
    /// Segment mode. Write-only: a read reports only the tag, so the
    /// parameters are unrecoverable here and live in the color buffer.
    Segment,
    /// Unrecognized mode tag, parameters kept raw.
    Unknown { tag: u8, params: Vec<u8> },
}

/// Decoded register content, one case per known register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    Power(bool),
    /// Dimmer percentage, 0-100.
    Dimmer(u8),
    Mode(Mode),
    /// ASCII version string from register 0x06.
    Version(String),
    HardwareVersion(String),
    FirmwareVersion(String),
    /// MAC address in device byte order (little-endian).
    Mac([u8; 6]),
    /// Restore the previous state on power-on.
    PowerMemory(bool),
    Sleep { enabled: bool, params: Vec<u8> },
    Wake { enabled: bool, params: Vec<u8> },
    Alarm { enabled: bool, params: Vec<u8> },
    Buffer(BufferPage),
    /// Restart reason. Write-only.
    Restart(u8),
    /// Raw bytes of a register with no semantic mapping.
    Opaque(Vec<u8>),
}

/// Decode raw register content into its semantic value.
///
/// Total: content that does not fit a known layout comes back as
/// [`RegisterValue::Opaque`] so unmapped registers stay readable.
/// Content arrives with its trailing zero padding already stripped,
/// so fixed-width layouts are restored before carving.
#[must_use]
pub fn decode(register: Register, content: &[u8]) -> RegisterValue {
    match (register.register, register.sub) {
        (REG_POWER, None) => RegisterValue::Power(content.first() == Some(&0x01)),
        (REG_DIMMER, None) => match content.first().copied().unwrap_or(0) {
            pct if pct <= MAX_PERCENT => RegisterValue::Dimmer(pct),
            _ => RegisterValue::Opaque(content.to_vec()),
        },
        (REG_MODE, None) => decode_mode(content),
        (REG_VERSION, None) => decode_ascii(content)
            .map_or_else(|| RegisterValue::Opaque(content.to_vec()), RegisterValue::Version),
        (REG_INFO, Some(SUB_INFO_HWVER)) => decode_ascii(content).map_or_else(
            || RegisterValue::Opaque(content.to_vec()),
            RegisterValue::HardwareVersion,
        ),
        (REG_INFO, Some(SUB_INFO_FWVER)) => decode_ascii(content).map_or_else(
            || RegisterValue::Opaque(content.to_vec()),
            RegisterValue::FirmwareVersion,
        ),
        (REG_INFO, Some(SUB_INFO_MAC | SUB_INFO_MAC_UNK)) => decode_mac(content),
        (REG_POWER_MEMORY, None) => {
            RegisterValue::PowerMemory(content.first().copied().unwrap_or(0) != 0)
        }
        (REG_SLEEP, None) => {
            let (enabled, params) = split_flag(content);
            RegisterValue::Sleep { enabled, params }
        }
        (REG_WAKE, None) => {
            let (enabled, params) = split_flag(content);
            RegisterValue::Wake { enabled, params }
        }
        (REG_ALARM, None) => {
            let (enabled, params) = split_flag(content);
            RegisterValue::Alarm { enabled, params }
        }
        (REG_BUFFER, Some(page)) => decode_buffer(page, content),
        _ => RegisterValue::Opaque(content.to_vec()),
    }
}

fn decode_mode(content: &[u8]) -> RegisterValue {
    let Some((&tag, params)) = content.split_first() else {
        return RegisterValue::Opaque(Vec::new());
    };
    let mode = match tag {
        MODE_SCENE => {
            let mut code = [0u8; 2];
            for (dst, src) in code.iter_mut().zip(params) {
                *dst = *src;
            }
            Mode::Scene {
                code: u16::from_le_bytes(code),
            }
        }
        MODE_MIC => Mode::Mic {
            music_mode: params.first().copied().unwrap_or(0),
            params: params.get(1..).unwrap_or_default().to_vec(),
        },
        MODE_SEGMENT => Mode::Segment,
        _ => Mode::Unknown {
            tag,
            params: params.to_vec(),
        },
    };
    RegisterValue::Mode(mode)
}

fn decode_ascii(content: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(content).ok()?.trim_end_matches('\0');
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return None;
    }
    Some(text.to_string())
}

fn decode_mac(content: &[u8]) -> RegisterValue {
    // 6 address bytes; the 0x02 sub-register appends two unknown
    // bytes. Shorter content lost trailing zeros to frame padding.
    if content.len() > 8 {
        return RegisterValue::Opaque(content.to_vec());
    }
    let mut mac = [0u8; 6];
    let take = content.len().min(6);
    mac[..take].copy_from_slice(&content[..take]);
    RegisterValue::Mac(mac)
}

fn split_flag(content: &[u8]) -> (bool, Vec<u8>) {
    match content.split_first() {
        Some((&flag, rest)) => (flag != 0, rest.to_vec()),
        None => (false, Vec::new()),
    }
}

fn decode_buffer(page: u8, content: &[u8]) -> RegisterValue {
    if content.len() > PAGE_SIZE {
        return RegisterValue::Opaque(content.to_vec());
    }

    let mut bytes = [0u8; PAGE_SIZE];
    bytes[..content.len()].copy_from_slice(content);

    if page == 0x00 {
        let color = BufferUnit::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let temperature = u16::from_le_bytes([bytes[10], bytes[11]]);
        return RegisterValue::Buffer(BufferPage::Status { color, temperature });
    }

    let mut units = [BufferUnit::Undefined; UNITS_PER_PAGE];
    for (unit, chunk) in units.iter_mut().zip(bytes.chunks_exact(4)) {
        *unit = BufferUnit::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    RegisterValue::Buffer(BufferPage::Colors(units))
}

/// Encode a semantic value into register write content.
///
/// Values the device cannot represent are rejected here, before any
/// frame is built.
pub fn encode(register: Register, value: &RegisterValue) -> Result<Vec<u8>, ProtocolError> {
    match (register.register, value) {
        (REG_POWER, RegisterValue::Power(on)) => Ok(vec![u8::from(*on)]),
        (REG_DIMMER, RegisterValue::Dimmer(pct)) => {
            check_percent(*pct, "dimmer")?;
            Ok(vec![*pct])
        }
        (REG_MODE, RegisterValue::Mode(Mode::Scene { code })) => {
            let mut out = vec![MODE_SCENE];
            out.extend_from_slice(&code.to_le_bytes());
            Ok(out)
        }
        (REG_MODE, RegisterValue::Mode(Mode::Mic { music_mode, params })) => {
            let mut out = vec![MODE_MIC, *music_mode];
            out.extend_from_slice(params);
            Ok(out)
        }
        (REG_RESTART, RegisterValue::Restart(reason)) => Ok(vec![*reason]),
        (REG_POWER_MEMORY, RegisterValue::PowerMemory(on)) => Ok(vec![u8::from(*on)]),
        (REG_SLEEP, RegisterValue::Sleep { enabled, params })
        | (REG_WAKE, RegisterValue::Wake { enabled, params })
        | (REG_ALARM, RegisterValue::Alarm { enabled, params }) => {
            let mut out = vec![u8::from(*enabled)];
            out.extend_from_slice(params);
            Ok(out)
        }
        (_, RegisterValue::Opaque(bytes)) => Ok(bytes.clone()),
        _ => Err(ProtocolError::UnsupportedRegister(register.register)),
    }
}

/// Segment bitmap as it goes on the wire: 15 bits, little-endian
#[must_use]
pub fn segment_mask_bytes(mask: u16) -> [u8; 2] {
    (mask & 0x7fff).to_le_bytes()
}

/// Mode-register payload for a segment color write.
///
/// Segment writes are a pseudo-register: the mode register accepts
/// this payload shape but cannot report it back on read.
#[must_use]
pub fn segment_color(rgb: (u8, u8, u8), mask: u16) -> Vec<u8> {
    let mut out = vec![MODE_SEGMENT, SEGMENT_COLOR, rgb.0, rgb.1, rgb.2];
    out.extend_from_slice(&[0u8; 5]);
    out.extend_from_slice(&segment_mask_bytes(mask));
    out
}

/// Mode-register payload for a segment brightness write
pub fn segment_brightness(percent: u8, mask: u16) -> Result<Vec<u8>, ProtocolError> {
    check_percent(percent, "brightness")?;
    let mut out = vec![MODE_SEGMENT, SEGMENT_BRIGHT, percent];
    out.extend_from_slice(&segment_mask_bytes(mask));
    Ok(out)
}

fn check_percent(value: u8, what: &str) -> Result<(), ProtocolError> {
    if value > MAX_PERCENT {
        return Err(ProtocolError::ValueOutOfRange(format!(
            "{what} must be 0-{MAX_PERCENT}, got {value}"
        )));
    }
    Ok(())
}
