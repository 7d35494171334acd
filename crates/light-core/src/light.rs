//! High-level light control on top of the register transport
//!
//! The controller caches register reads the way the vendor app does:
//! the device pushes fresh state on its own, so a cached value stays
//! good until a write touches it. Writes invalidate instead of
//! patching, since write acknowledgements never echo content.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use govee_protocol::registers::{
    self, PAGE_SIZE, REG_BUFFER, SEGMENT_COUNT, SEGMENT_OFFSET, UNITS_PER_PAGE,
};
use govee_protocol::{
    BufferUnit, Command, Frame, LightEvent, LightTransport, Mode, ProtocolError, Register,
    RegisterValue,
};

use crate::error::LightError;
use crate::scenes::{Scene, SceneCatalog};

/// The vendor app reads the power register every two seconds. The
/// read doubles as a keepalive and picks up physical button presses.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(2);

/// What the light is currently displaying
#[derive(Debug, Clone, PartialEq)]
pub enum LightMode {
    /// Segment mode with every segment equal.
    Color(BufferUnit),
    /// Segment mode, one entry per segment.
    Segments(Vec<BufferUnit>),
    /// A scene animation.
    Scene { code: u16, name: Option<String> },
    /// Mic/music reactive mode.
    Music { music_mode: u8, params: Vec<u8> },
    /// A mode this library does not map.
    Other { tag: u8, params: Vec<u8> },
}

/// A connected light
pub struct LightController {
    transport: Arc<LightTransport>,
    catalog: SceneCatalog,
    cache: Arc<DashMap<Register, Vec<u8>>>,
}

impl LightController {
    /// Wrap a transport, feeding its unsolicited reports into the
    /// state cache
    #[must_use]
    pub fn new(transport: LightTransport, catalog: SceneCatalog) -> Self {
        let transport = Arc::new(transport);
        let cache: Arc<DashMap<Register, Vec<u8>>> = Arc::new(DashMap::new());

        let mut events = transport.subscribe();
        let listener_cache = Arc::clone(&cache);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    LightEvent::PowerReported(on) => {
                        let content = if on { vec![0x01] } else { Vec::new() };
                        listener_cache.insert(Register::POWER, content);
                    }
                    LightEvent::BufferReported { page, content } => {
                        listener_cache.insert(Register::buffer_page(page), content);
                    }
                    LightEvent::RegisterReported { register, content } => {
                        listener_cache.insert(register, content);
                    }
                }
            }
        });

        Self {
            transport,
            catalog,
            cache,
        }
    }

    /// Unsolicited device reports, e.g. for reacting to the physical
    /// power button
    #[must_use]
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<LightEvent> {
        self.transport.subscribe()
    }

    /// The scene catalog this controller resolves names against
    #[must_use]
    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    async fn cached_read(&self, register: Register) -> Result<Vec<u8>, LightError> {
        if let Some(content) = self.cache.get(&register) {
            return Ok(content.clone());
        }
        self.refresh(register).await
    }

    /// Read a register from the device, bypassing and updating the
    /// cache
    pub async fn refresh(&self, register: Register) -> Result<Vec<u8>, LightError> {
        let content = self.transport.read_register(register).await?;
        self.cache.insert(register, content.clone());
        Ok(content)
    }

    async fn write(&self, register: Register, content: Vec<u8>) -> Result<(), LightError> {
        self.cache.remove(&register);
        self.transport.write_register(register, content).await?;
        Ok(())
    }

    /// Segment writes land in the color buffer behind the mode
    /// register, so both go stale together.
    fn invalidate_mode(&self) {
        self.cache.remove(&Register::MODE);
        self.cache.retain(|register, _| register.register != REG_BUFFER);
    }

    pub async fn power(&self) -> Result<bool, LightError> {
        let content = self.cached_read(Register::POWER).await?;
        Ok(content.first() == Some(&0x01))
    }

    pub async fn set_power(&self, on: bool) -> Result<(), LightError> {
        let content = registers::encode(Register::POWER, &RegisterValue::Power(on))?;
        self.write(Register::POWER, content).await
    }

    /// Whole-light brightness in percent
    pub async fn dimmer(&self) -> Result<u8, LightError> {
        let content = self.cached_read(Register::DIMMER).await?;
        Ok(content.first().copied().unwrap_or(0))
    }

    pub async fn set_dimmer(&self, percent: u8) -> Result<(), LightError> {
        let content = registers::encode(Register::DIMMER, &RegisterValue::Dimmer(percent))?;
        self.write(Register::DIMMER, content).await
    }

    /// What the light is showing right now.
    ///
    /// Segment mode and the zero scene code both resolve through the
    /// color buffer; a uniform buffer collapses to a single color.
    pub async fn mode(&self) -> Result<LightMode, LightError> {
        let content = self.cached_read(Register::MODE).await?;
        match registers::decode(Register::MODE, &content) {
            RegisterValue::Mode(Mode::Scene { code }) if code != 0 => Ok(LightMode::Scene {
                code,
                name: self.catalog.scene_name(code),
            }),
            RegisterValue::Mode(Mode::Scene { .. } | Mode::Segment) => {
                self.buffer_mode().await
            }
            RegisterValue::Mode(Mode::Mic { music_mode, params }) => {
                Ok(LightMode::Music { music_mode, params })
            }
            RegisterValue::Mode(Mode::Unknown { tag, params }) => {
                Ok(LightMode::Other { tag, params })
            }
            _ => Err(LightError::UnexpectedContent {
                register: Register::MODE.to_string(),
                content,
            }),
        }
    }

    async fn buffer_mode(&self) -> Result<LightMode, LightError> {
        let segments = self.segments(u16::MAX).await?;
        let first = segments[0];
        if segments.iter().all(|s| *s == first) {
            Ok(LightMode::Color(first))
        } else {
            Ok(LightMode::Segments(segments))
        }
    }

    /// Color unit of one segment, read from the color buffer
    pub async fn segment(&self, index: usize) -> Result<BufferUnit, LightError> {
        if index >= SEGMENT_COUNT {
            return Err(ProtocolError::ValueOutOfRange(format!(
                "segment must be 0-{}, got {index}",
                SEGMENT_COUNT - 1
            ))
            .into());
        }

        let slot = index + SEGMENT_OFFSET;
        let page = Register::buffer_page((slot / UNITS_PER_PAGE) as u8);
        let content = self.cached_read(page).await?;
        if content.len() > PAGE_SIZE {
            return Err(LightError::UnexpectedContent {
                register: page.to_string(),
                content,
            });
        }

        // Restore the zero padding the frame trim removed
        let mut bytes = [0u8; PAGE_SIZE];
        bytes[..content.len()].copy_from_slice(&content);
        let offset = (slot % UNITS_PER_PAGE) * 4;
        Ok(BufferUnit::from_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]))
    }

    /// Color units of the segments selected by the bitmap
    pub async fn segments(&self, mask: u16) -> Result<Vec<BufferUnit>, LightError> {
        let mut out = Vec::new();
        for index in 0..SEGMENT_COUNT {
            if mask & (1 << index) != 0 {
                out.push(self.segment(index).await?);
            }
        }
        Ok(out)
    }

    /// Set the color of the segments selected by the bitmap
    pub async fn set_color(&self, rgb: (u8, u8, u8), mask: u16) -> Result<(), LightError> {
        self.invalidate_mode();
        let payload = registers::segment_color(rgb, mask);
        self.transport.write_register(Register::MODE, payload).await?;
        Ok(())
    }

    /// Set the brightness of the segments selected by the bitmap
    pub async fn set_brightness(&self, percent: u8, mask: u16) -> Result<(), LightError> {
        self.invalidate_mode();
        let payload = registers::segment_brightness(percent, mask)?;
        self.transport.write_register(Register::MODE, payload).await?;
        Ok(())
    }

    /// Approximate a color temperature with an RGB white on the
    /// segments selected by the bitmap
    pub async fn set_color_temperature(&self, kelvin: u16, mask: u16) -> Result<(), LightError> {
        self.set_color(kelvin_to_rgb(kelvin), mask).await
    }

    /// Start a scene by catalog name, `category-scene` path, or
    /// built-in name.
    ///
    /// Catalog scenes usually carry a bulk parameter blob that has to
    /// be uploaded before the scene code is written.
    pub async fn set_scene(&self, name: &str) -> Result<(), LightError> {
        let (code, param) = if let Some(scene) = self.catalog.get(name) {
            let effect = scene
                .effects
                .first()
                .ok_or_else(|| LightError::UnknownScene(name.to_string()))?;
            (effect.code, effect.param.clone())
        } else if let Some(code) = SceneCatalog::builtin_code(name) {
            (code, Vec::new())
        } else {
            return Err(LightError::UnknownScene(name.to_string()));
        };

        // The vendor app primes every scene change with a power read.
        self.refresh(Register::POWER).await?;

        if !param.is_empty() {
            self.transport.write_multi(Bytes::from(param)).await?;
        }

        self.invalidate_mode();
        let content = registers::encode(
            Register::MODE,
            &RegisterValue::Mode(Mode::Scene { code }),
        )?;
        self.transport.write_register(Register::MODE, content).await?;
        Ok(())
    }

    /// The catalog scene currently playing, if the light is in scene
    /// mode with a cataloged code
    pub async fn current_scene(&self) -> Result<Option<Scene>, LightError> {
        match self.mode().await? {
            LightMode::Scene { code, .. } => Ok(self.catalog.by_code(code).cloned()),
            _ => Ok(None),
        }
    }

    pub async fn version(&self) -> Result<String, LightError> {
        self.read_string(Register::VERSION).await
    }

    pub async fn hardware_version(&self) -> Result<String, LightError> {
        self.read_string(Register::HWVER).await
    }

    pub async fn firmware_version(&self) -> Result<String, LightError> {
        self.read_string(Register::FWVER).await
    }

    async fn read_string(&self, register: Register) -> Result<String, LightError> {
        let content = self.cached_read(register).await?;
        match registers::decode(register, &content) {
            RegisterValue::Version(s)
            | RegisterValue::HardwareVersion(s)
            | RegisterValue::FirmwareVersion(s) => Ok(s),
            _ => Err(LightError::UnexpectedContent {
                register: register.to_string(),
                content,
            }),
        }
    }

    /// MAC address in device byte order, colon-separated hex
    pub async fn mac(&self) -> Result<String, LightError> {
        let content = self.cached_read(Register::MAC).await?;
        match registers::decode(Register::MAC, &content) {
            RegisterValue::Mac(mac) => Ok(mac
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":")),
            _ => Err(LightError::UnexpectedContent {
                register: Register::MAC.to_string(),
                content,
            }),
        }
    }

    /// Restart the light. The link drops before any acknowledgement,
    /// so none is awaited.
    pub async fn restart(&self, reason: u8) -> Result<(), LightError> {
        self.cache.clear();
        let mut payload = Register::RESTART.address_bytes();
        payload.push(reason);
        let frame = Frame::new(Command::Write, payload)?;
        self.transport.send_frame(frame).await?;
        Ok(())
    }

    /// Raw register read, for poking at unmapped registers
    pub async fn peek(&self, register: Register) -> Result<Vec<u8>, LightError> {
        self.refresh(register).await
    }

    /// Raw register write
    pub async fn poke(&self, register: Register, content: Vec<u8>) -> Result<(), LightError> {
        self.write(register, content).await
    }

    /// Send a raw frame with no acknowledgement tracking
    pub async fn send_frame(&self, frame: Frame) -> Result<(), LightError> {
        self.transport.send_frame(frame).await?;
        Ok(())
    }

    /// Spawn the periodic power read the device expects from a
    /// connected app
    #[must_use]
    pub fn keepalive(&self) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT_PERIOD).await;
                match transport.read_register(Register::POWER).await {
                    Ok(content) => {
                        cache.insert(Register::POWER, content);
                    }
                    Err(e) => tracing::warn!("keepalive read failed: {e}"),
                }
            }
        })
    }
}

fn scale(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

/// Approximate a color temperature as RGB.
///
/// Tanner Helland's curve fit, with the input clamped to the
/// temperature range the device itself accepts.
#[must_use]
pub fn kelvin_to_rgb(kelvin: u16) -> (u8, u8, u8) {
    let t = f64::from(kelvin.clamp(registers::MIN_TEMP, registers::MAX_TEMP)) / 100.0;

    let r = if t <= 66.0 {
        255
    } else {
        scale(329.698_727_446 * (t - 60.0).powf(-0.133_204_759_2))
    };

    let g = if t <= 66.0 {
        scale(99.470_802_586_1 * t.ln() - 161.119_568_166_1)
    } else {
        scale(288.122_169_528_3 * (t - 60.0).powf(-0.075_514_849_2))
    };

    let b = if t >= 66.0 {
        255
    } else {
        scale(138.517_731_223_1 * (t - 10.0).ln() - 305.044_792_730_7)
    };

    (r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use govee_protocol::multi::{COMPLETION_MARKER, TERMINAL_INDEX};
    use govee_protocol::registers::{
        has_subregisters, MODE_SCENE, MODE_SEGMENT, REG_MODE, REG_RESTART,
    };
    use govee_protocol::transport::WireFrame;
    use govee_protocol::{Argb, LinkHandle, TransportConfig};

    /// A simulated light holding real register state
    struct SimLight {
        from_host: mpsc::Receiver<WireFrame>,
        to_host: mpsc::Sender<WireFrame>,
        registers: HashMap<Register, Vec<u8>>,
        multi_log: Arc<Mutex<Vec<Vec<u8>>>>,
        write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    struct SimHarness {
        controller: LightController,
        multi_log: Arc<Mutex<Vec<Vec<u8>>>>,
        write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    fn trim(mut bytes: Vec<u8>) -> Vec<u8> {
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    impl SimLight {
        fn start(registers: HashMap<Register, Vec<u8>>, catalog: SceneCatalog) -> SimHarness {
            let (out_tx, out_rx) = mpsc::channel(32);
            let (in_tx, in_rx) = mpsc::channel(32);
            let multi_log = Arc::new(Mutex::new(Vec::new()));
            let write_log = Arc::new(Mutex::new(Vec::new()));

            let sim = SimLight {
                from_host: out_rx,
                to_host: in_tx,
                registers,
                multi_log: Arc::clone(&multi_log),
                write_log: Arc::clone(&write_log),
            };
            tokio::spawn(sim.run());

            let transport = LightTransport::with_config(
                LinkHandle {
                    outgoing: out_tx,
                    incoming: in_rx,
                },
                TransportConfig {
                    ack_timeout: Duration::from_millis(200),
                    ..TransportConfig::default()
                },
            );
            SimHarness {
                controller: LightController::new(transport, catalog),
                multi_log,
                write_log,
            }
        }

        async fn run(mut self) {
            let mut multi_data = Vec::new();
            while let Some(raw) = self.from_host.recv().await {
                let frame = Frame::decode(&raw).expect("host sent a bad frame");
                match frame.command {
                    Command::Read => {
                        let (register, _) = Self::carve(&frame.payload);
                        let content = self.registers.get(&register).cloned().unwrap_or_default();
                        let mut payload = register.address_bytes();
                        payload.extend_from_slice(&content);
                        self.reply(Command::Read, payload).await;
                    }
                    Command::Write => {
                        let (register, content) = Self::carve(&frame.payload);
                        self.write_log.lock().unwrap().push({
                            let mut entry = register.address_bytes();
                            entry.extend_from_slice(&content);
                            entry
                        });
                        // The real device stores power as a strict
                        // boolean no matter what was written.
                        let stored = if register == Register::POWER {
                            if content == [0x01] { vec![0x01] } else { Vec::new() }
                        } else {
                            content
                        };
                        self.registers.insert(register, stored);
                        self.reply(Command::Write, register.address_bytes()).await;
                    }
                    Command::Multi => {
                        let index = frame.payload[0];
                        if index == TERMINAL_INDEX {
                            let data = trim(std::mem::take(&mut multi_data));
                            self.multi_log.lock().unwrap().push(data);
                            self.reply(Command::Multi, vec![COMPLETION_MARKER]).await;
                        } else if frame.payload[1] == 0x01 && frame.payload[3] == 0x02 {
                            multi_data.extend_from_slice(&frame.payload[4..]);
                        } else {
                            multi_data.extend_from_slice(&frame.payload[1..]);
                        }
                    }
                    _ => {}
                }
            }
        }

        fn carve(payload: &[u8]) -> (Register, Vec<u8>) {
            let register = if has_subregisters(payload[0]) {
                Register::sub(payload[0], payload[1])
            } else {
                Register::plain(payload[0])
            };
            let skip = register.address_bytes().len();
            (register, trim(payload[skip..].to_vec()))
        }

        async fn reply(&self, command: Command, payload: Vec<u8>) {
            let frame = Frame::new(command, payload).unwrap();
            let _ = self.to_host.send(frame.encode()).await;
        }
    }

    fn uniform_buffer(registers: &mut HashMap<Register, Vec<u8>>, unit: [u8; 4]) {
        for page in 1..=5u8 {
            let mut content = Vec::new();
            for _ in 0..UNITS_PER_PAGE {
                content.extend_from_slice(&unit);
            }
            registers.insert(Register::buffer_page(page), content);
        }
    }

    #[tokio::test]
    async fn test_power_roundtrip() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let light = &harness.controller;

        assert!(!light.power().await.unwrap());
        light.set_power(true).await.unwrap();
        assert!(light.power().await.unwrap());
    }

    #[tokio::test]
    async fn test_power_write_is_normalized() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let light = &harness.controller;

        light.poke(Register::POWER, vec![0x02]).await.unwrap();
        assert!(!light.power().await.unwrap());
    }

    #[tokio::test]
    async fn test_dimmer() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let light = &harness.controller;

        light.set_dimmer(50).await.unwrap();
        assert_eq!(light.dimmer().await.unwrap(), 50);

        let result = light.set_dimmer(101).await;
        assert!(matches!(
            result,
            Err(LightError::Protocol(ProtocolError::ValueOutOfRange(_)))
        ));
    }

    #[tokio::test]
    async fn test_identity_registers() {
        let mut registers = HashMap::new();
        registers.insert(Register::VERSION, b"1.00.14".to_vec());
        registers.insert(Register::MAC, vec![0x88, 0x1a, 0x35, 0x32, 0x39, 0xd3]);
        let harness = SimLight::start(registers, SceneCatalog::default());
        let light = &harness.controller;

        assert_eq!(light.version().await.unwrap(), "1.00.14");
        assert_eq!(light.mac().await.unwrap(), "88:1a:35:32:39:d3");
    }

    #[tokio::test]
    async fn test_uniform_segments_collapse_to_color() {
        let mut registers = HashMap::new();
        registers.insert(Register::MODE, vec![MODE_SEGMENT]);
        uniform_buffer(&mut registers, [100, 255, 0, 0]);
        let harness = SimLight::start(registers, SceneCatalog::default());

        let mode = harness.controller.mode().await.unwrap();
        assert_eq!(
            mode,
            LightMode::Color(BufferUnit::Color(Argb {
                brightness: 100,
                r: 255,
                g: 0,
                b: 0
            }))
        );
    }

    #[tokio::test]
    async fn test_mixed_segments_stay_segments() {
        let mut registers = HashMap::new();
        registers.insert(Register::MODE, vec![MODE_SEGMENT]);
        uniform_buffer(&mut registers, [100, 255, 0, 0]);
        // Segment 14 lives in the last slot of page 5
        let page = registers.get_mut(&Register::buffer_page(5)).unwrap();
        page[8..].copy_from_slice(&[100, 0, 0, 255]);
        let harness = SimLight::start(registers, SceneCatalog::default());

        let LightMode::Segments(segments) = harness.controller.mode().await.unwrap() else {
            panic!("expected distinct segments");
        };
        assert_eq!(segments.len(), SEGMENT_COUNT);
        assert_eq!(
            segments[14],
            BufferUnit::Color(Argb {
                brightness: 100,
                r: 0,
                g: 0,
                b: 255
            })
        );
    }

    #[tokio::test]
    async fn test_scene_mode_resolves_builtin_name() {
        let mut registers = HashMap::new();
        registers.insert(Register::MODE, vec![MODE_SCENE, 0x3f, 0x00]);
        let harness = SimLight::start(registers, SceneCatalog::default());

        let mode = harness.controller.mode().await.unwrap();
        assert_eq!(
            mode,
            LightMode::Scene {
                code: 0x3f,
                name: Some("illumination".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_set_scene_uploads_param_then_code() {
        let catalog = SceneCatalog::parse(
            r#"{"Nature": {"Sunrise Glow": {"effects": [{"code": 927, "param": "AAEC"}]}}}"#,
        )
        .unwrap();
        let harness = SimLight::start(HashMap::new(), catalog);
        let light = &harness.controller;

        light.set_scene("nature-sunrise glow").await.unwrap();

        assert_eq!(*harness.multi_log.lock().unwrap(), vec![vec![0x00, 0x01, 0x02]]);
        let writes = harness.write_log.lock().unwrap();
        assert_eq!(
            writes.last().unwrap(),
            &vec![REG_MODE, MODE_SCENE, 0x9f, 0x03]
        );
        drop(writes);

        let mode = light.mode().await.unwrap();
        assert_eq!(
            mode,
            LightMode::Scene {
                code: 927,
                name: Some("Sunrise Glow".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_set_scene_builtin_has_no_upload() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        harness.controller.set_scene("sunset").await.unwrap();

        assert!(harness.multi_log.lock().unwrap().is_empty());
        // Code 1 goes out as LE [0x01, 0x00]; the high byte is
        // indistinguishable from frame padding and trims away.
        let writes = harness.write_log.lock().unwrap();
        assert_eq!(writes.last().unwrap(), &vec![REG_MODE, MODE_SCENE, 0x01]);
    }

    #[tokio::test]
    async fn test_set_scene_unknown() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let result = harness.controller.set_scene("disco inferno").await;
        assert!(matches!(result, Err(LightError::UnknownScene(_))));
    }

    #[tokio::test]
    async fn test_set_color_goes_through_mode_register() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        harness
            .controller
            .set_color((0xff, 0x80, 0x00), u16::MAX)
            .await
            .unwrap();

        let writes = harness.write_log.lock().unwrap();
        let write = writes.last().unwrap();
        assert_eq!(write[0], REG_MODE);
        assert_eq!(&write[1..6], &[MODE_SEGMENT, 0x01, 0xff, 0x80, 0x00]);
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_read() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let light = &harness.controller;

        assert_eq!(light.dimmer().await.unwrap(), 0);
        light.set_dimmer(75).await.unwrap();
        // The cached zero must not survive the write
        assert_eq!(light.dimmer().await.unwrap(), 75);
    }

    #[tokio::test]
    async fn test_restart_sends_without_waiting() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        harness.controller.restart(1).await.unwrap();

        // Give the engine a chance to flush the frame
        tokio::time::sleep(Duration::from_millis(20)).await;
        let writes = harness.write_log.lock().unwrap();
        assert_eq!(writes.last().unwrap(), &vec![REG_RESTART, 0x01]);
    }

    #[tokio::test]
    async fn test_out_of_range_segment() {
        let harness = SimLight::start(HashMap::new(), SceneCatalog::default());
        let result = harness.controller.segment(SEGMENT_COUNT).await;
        assert!(matches!(
            result,
            Err(LightError::Protocol(ProtocolError::ValueOutOfRange(_)))
        ));
    }

    #[test]
    fn test_kelvin_warm_end() {
        assert_eq!(kelvin_to_rgb(2000), (255, 136, 13));
        // Below the device minimum clamps to it
        assert_eq!(kelvin_to_rgb(1000), kelvin_to_rgb(2000));
    }

    #[test]
    fn test_kelvin_neutral_is_white() {
        assert_eq!(kelvin_to_rgb(6600), (255, 255, 255));
    }

    #[test]
    fn test_kelvin_cool_end() {
        // Above the device maximum clamps to it
        assert_eq!(kelvin_to_rgb(20000), kelvin_to_rgb(8800));
        let (r, _, b) = kelvin_to_rgb(8800);
        assert!(r < 255);
        assert_eq!(b, 255);
    }
}
