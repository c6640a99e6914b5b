//! Sensor hub session.
//!
//! [`Sh2Hub`] drives a [`HubLink`]: it builds outgoing SHTP packets, parses
//! incoming ones and turns them into [`HubEvent`]s. Blocking helpers such as
//! [`Sh2Hub::wait_for_reset`] poll the link until their answer arrives and
//! queue every other event so that the next [`Sh2Hub::service`] call still
//! returns it.

use crate::control::{
    self, CalEnable, CommandResponse, FrsReadRequest, FrsReadResponse, FrsReadStatus,
    FrsWriteResponse, ProductId, SensorConfig, BASE_TIMESTAMP, COMMAND_RESP, FRS_READ_RESP,
    FRS_WRITE_COMPLETED, FRS_WRITE_RESP, GET_FEATURE_RESP, PROD_ID_REQ, PROD_ID_RESP,
    TIMESTAMP_REBASE,
};
use crate::error::Sh2Error;
use crate::sensor::{report_len, SensorId, SensorValue};
use crate::shtp::{Channel, ShtpHeader, ShtpSequencer};
use bytes::{Buf, BytesMut};
use logger_transport::{HubLink, Message};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const EXECUTABLE_RESET_COMPLETE: u8 = 0x01;
const TIMEBASE_RECORD_LEN: usize = 5;
const MAX_FRS_WORDS: usize = 1024;

/// Events batch returned by one service call
pub type HubEvents = SmallVec<[HubEvent; 8]>;

/// Asynchronous hub notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncEvent {
    /// Hub finished a reset
    Reset,
    /// A flash record changed
    FrsChange(u16),
    /// Unrecognised executable-channel notification
    Unknown(u32),
}

/// Everything the hub can report
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// Asynchronous notification
    Async(AsyncEvent),
    /// Decoded sensor sample
    Sensor(SensorValue),
    /// Product ID entry
    ProductId(ProductId),
    /// Command response
    CommandResponse(CommandResponse),
    /// Words of a flash record being read
    FrsRead(FrsReadResponse),
    /// Progress of a flash record write
    FrsWrite(FrsWriteResponse),
}

/// Session timing
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Quiet time that ends collection of product ID entries
    pub product_id_idle: Duration,
    /// Upper bound on product ID entries
    pub max_product_ids: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            product_id_idle: Duration::from_millis(50),
            max_product_ids: 5,
        }
    }
}

/// Session with a sensor hub over a [`HubLink`]
pub struct Sh2Hub<L> {
    link: L,
    config: HubConfig,
    sequencer: ShtpSequencer,
    command_seq: u8,
    timebase_us: i64,
    reset_count: u64,
    pending: VecDeque<HubEvent>,
}

impl<L: HubLink> Sh2Hub<L> {
    /// Create a session; the link is opened by [`Sh2Hub::open`]
    pub fn new(link: L, config: HubConfig) -> Self {
        Self {
            link,
            config,
            sequencer: ShtpSequencer::new(),
            command_seq: 0,
            timebase_us: 0,
            reset_count: 0,
            pending: VecDeque::new(),
        }
    }

    /// Underlying link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Open the link and clear session state
    pub fn open(&mut self) -> Result<(), Sh2Error> {
        self.sequencer = ShtpSequencer::new();
        self.command_seq = 0;
        self.timebase_us = 0;
        self.pending.clear();
        self.link.open()?;
        info!("Sensor hub session opened");
        Ok(())
    }

    /// Close the link
    pub fn close(&mut self) {
        self.link.close();
        info!("Sensor hub session closed");
    }

    /// Number of reset notifications seen
    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }

    /// Read at most one message from the link and return all events that
    /// are ready, queued ones first
    pub fn service(&mut self) -> Result<HubEvents, Sh2Error> {
        let mut events: HubEvents = self.pending.drain(..).collect();
        if let Some(message) = self.link.read_message()? {
            self.dispatch(&message, &mut events);
        }
        Ok(events)
    }

    /// Take the events queued by blocking helpers without touching the link
    pub fn drain_pending(&mut self) -> HubEvents {
        self.pending.drain(..).collect()
    }

    fn poll(&mut self) -> Result<(), Sh2Error> {
        if let Some(message) = self.link.read_message()? {
            let mut events = HubEvents::new();
            self.dispatch(&message, &mut events);
            self.pending.extend(events);
        }
        Ok(())
    }

    fn deadline(&self, timeout: Duration) -> u64 {
        self.link.now_us().saturating_add(timeout.as_micros() as u64)
    }

    /// Poll until the hub reports a reset or `timeout` passes.
    ///
    /// Only resets that arrive during this call count. The reset event stays
    /// queued for the next [`Sh2Hub::service`] call.
    pub fn wait_for_reset(&mut self, timeout: Duration) -> Result<bool, Sh2Error> {
        let start_count = self.reset_count;
        let deadline = self.deadline(timeout);
        debug!("Waiting for hub reset");

        loop {
            self.poll()?;
            if self.reset_count > start_count {
                return Ok(true);
            }
            if self.link.now_us() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Request the product IDs of all firmware components
    pub fn product_ids(&mut self, timeout: Duration) -> Result<Vec<ProductId>, Sh2Error> {
        self.send(Channel::Control, &[PROD_ID_REQ, 0x00])?;

        let deadline = self.deadline(timeout);
        let idle_us = self.config.product_id_idle.as_micros() as u64;
        let mut ids = Vec::new();
        let mut last_rx = self.link.now_us();

        loop {
            self.poll()?;
            let before = ids.len();
            self.pending.retain(|event| match event {
                HubEvent::ProductId(id) => {
                    ids.push(*id);
                    false
                }
                _ => true,
            });

            let now = self.link.now_us();
            if ids.len() > before {
                last_rx = now;
            }
            if ids.len() >= self.config.max_product_ids {
                break;
            }
            if !ids.is_empty() && now.saturating_sub(last_rx) >= idle_us {
                break;
            }
            if now >= deadline {
                break;
            }
        }

        if ids.is_empty() {
            return Err(Sh2Error::Timeout("product ids"));
        }
        ids.truncate(self.config.max_product_ids);
        debug!("Received {} product id entries", ids.len());
        Ok(ids)
    }

    /// Configure one sensor; a zero report interval disables it
    pub fn set_sensor_config(
        &mut self,
        sensor: SensorId,
        config: &SensorConfig,
    ) -> Result<(), Sh2Error> {
        let mut payload = BytesMut::new();
        config.encode(sensor.id(), &mut payload);
        debug!(
            "Set feature {:?} interval {} us",
            sensor, config.report_interval_us
        );
        self.send(Channel::Control, &payload)
    }

    /// Enable or disable periodic saving of dynamic calibration data
    pub fn set_dcd_auto_save(&mut self, enabled: bool) -> Result<(), Sh2Error> {
        let disable = if enabled { 0 } else { 1 };
        self.send_command(control::CMD_DCD_PERIODIC_SAVE, &[disable])
            .map(|_| ())
    }

    /// Select which motion engine calibrations run and wait for the answer
    pub fn set_cal_config(&mut self, enable: CalEnable, timeout: Duration) -> Result<(), Sh2Error> {
        let seq = self.send_command(
            control::CMD_ME_CALIBRATE,
            &control::cal_config_params(enable),
        )?;
        let response = self.wait_for_command(control::CMD_ME_CALIBRATE, seq, timeout)?;
        if response.status() != 0 {
            return Err(Sh2Error::CommandFailed {
                command: control::CMD_ME_CALIBRATE,
                status: response.status(),
            });
        }
        Ok(())
    }

    /// Clear dynamic calibration data and reset the hub
    pub fn clear_dcd_and_reset(&mut self) -> Result<(), Sh2Error> {
        self.send_command(control::CMD_CLEAR_DCD_RESET, &[])
            .map(|_| ())
    }

    /// Read a whole flash record.
    ///
    /// An empty record gives an empty vector. Words past the first 1024 are
    /// dropped.
    pub fn read_frs(&mut self, frs_type: u16, timeout: Duration) -> Result<Vec<u32>, Sh2Error> {
        let mut payload = BytesMut::new();
        FrsReadRequest::record(frs_type).encode(&mut payload);
        self.send(Channel::Control, &payload)?;

        let deadline = self.deadline(timeout);
        let mut words = Vec::new();
        loop {
            self.poll()?;
            let mut responses = Vec::new();
            self.pending.retain(|event| match event {
                HubEvent::FrsRead(r) if r.frs_type == frs_type => {
                    responses.push(*r);
                    false
                }
                _ => true,
            });

            for response in responses {
                if response.status.is_error() {
                    return Err(Sh2Error::FrsFailed {
                        frs_type,
                        status: response.status.code(),
                    });
                }
                if response.status == FrsReadStatus::RecordEmpty {
                    debug!("FRS record 0x{:04x} is empty", frs_type);
                    return Ok(Vec::new());
                }

                let offset = response.offset as usize;
                let end = (offset + response.words().len()).min(MAX_FRS_WORDS);
                if offset < end {
                    if words.len() < end {
                        words.resize(end, 0);
                    }
                    words[offset..end].copy_from_slice(&response.words()[..end - offset]);
                }
                if response.status.is_last() {
                    debug!("Read {} words of FRS record 0x{:04x}", words.len(), frs_type);
                    return Ok(words);
                }
            }

            if self.link.now_us() >= deadline {
                return Err(Sh2Error::Timeout("FRS read"));
            }
        }
    }

    /// Erase a flash record by writing it with zero words
    pub fn erase_frs(&mut self, frs_type: u16, timeout: Duration) -> Result<(), Sh2Error> {
        let mut payload = BytesMut::new();
        control::encode_frs_write(frs_type, 0, &mut payload);
        self.send(Channel::Control, &payload)?;

        let deadline = self.deadline(timeout);
        loop {
            self.poll()?;
            while let Some(index) = self
                .pending
                .iter()
                .position(|event| matches!(event, HubEvent::FrsWrite(_)))
            {
                let Some(HubEvent::FrsWrite(response)) = self.pending.remove(index) else {
                    continue;
                };
                match response.status {
                    FRS_WRITE_COMPLETED => {
                        debug!("Erased FRS record 0x{:04x}", frs_type);
                        return Ok(());
                    }
                    // Words received, write mode ready, record valid
                    0 | 4 | control::FRS_WRITE_RECORD_VALID => {}
                    status => return Err(Sh2Error::FrsFailed { frs_type, status }),
                }
            }

            if self.link.now_us() >= deadline {
                return Err(Sh2Error::Timeout("FRS write"));
            }
        }
    }

    /// Ask the hub to reset
    pub fn soft_reset(&mut self) -> Result<(), Sh2Error> {
        self.link.soft_reset()?;
        Ok(())
    }

    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), Sh2Error> {
        let packet = self.sequencer.packet(channel, payload);
        self.link.write(&packet)?;
        Ok(())
    }

    fn send_command(&mut self, command: u8, params: &[u8]) -> Result<u8, Sh2Error> {
        let seq = self.command_seq;
        self.command_seq = self.command_seq.wrapping_add(1);

        let mut payload = BytesMut::new();
        control::encode_command(seq, command, params, &mut payload);
        self.send(Channel::Control, &payload)?;
        Ok(seq)
    }

    fn wait_for_command(
        &mut self,
        command: u8,
        seq: u8,
        timeout: Duration,
    ) -> Result<CommandResponse, Sh2Error> {
        let deadline = self.deadline(timeout);
        loop {
            self.poll()?;
            let found = self.pending.iter().position(|event| {
                matches!(event, HubEvent::CommandResponse(r) if r.command == command && r.command_seq == seq)
            });
            if let Some(HubEvent::CommandResponse(response)) =
                found.and_then(|index| self.pending.remove(index))
            {
                return Ok(response);
            }
            if self.link.now_us() >= deadline {
                return Err(Sh2Error::Timeout("command response"));
            }
        }
    }

    fn dispatch(&mut self, message: &Message, events: &mut HubEvents) {
        let (header, payload) = match ShtpHeader::split(&message.payload) {
            Ok(parts) => parts,
            Err(e) => {
                debug!("Dropping malformed packet: {}", e);
                return;
            }
        };
        if header.continuation {
            debug!("Dropping continuation packet on channel {}", header.channel);
            return;
        }

        let channel = match Channel::try_from(header.channel) {
            Ok(channel) => channel,
            Err(e) => {
                debug!("{}", e);
                return;
            }
        };

        match channel {
            Channel::Command => trace!("Ignoring {} byte SHTP advertisement", payload.len()),
            Channel::Executable => self.handle_executable(payload, events),
            Channel::Control => self.handle_control(payload, events),
            Channel::SensorReports | Channel::WakeReports => {
                self.handle_reports(payload, message.timestamp_us, events)
            }
            Channel::GyroRv => {
                match SensorValue::decode_gyro_rv(payload, header.sequence, message.timestamp_us) {
                    Ok(value) => events.push(HubEvent::Sensor(value)),
                    Err(e) => debug!("Dropping gyro rotation vector: {}", e),
                }
            }
        }
    }

    fn handle_executable(&mut self, payload: &[u8], events: &mut HubEvents) {
        match payload.first() {
            Some(&EXECUTABLE_RESET_COMPLETE) => {
                info!("Sensor hub reset complete");
                self.reset_count += 1;
                self.timebase_us = 0;
                events.push(HubEvent::Async(AsyncEvent::Reset));
            }
            Some(&other) => events.push(HubEvent::Async(AsyncEvent::Unknown(other as u32))),
            None => {}
        }
    }

    fn handle_control(&mut self, payload: &[u8], events: &mut HubEvents) {
        let Some(&report_id) = payload.first() else {
            return;
        };
        let event = match report_id {
            PROD_ID_RESP => ProductId::parse(payload).map(HubEvent::ProductId),
            COMMAND_RESP => CommandResponse::parse(payload).map(HubEvent::CommandResponse),
            FRS_READ_RESP => FrsReadResponse::parse(payload).map(HubEvent::FrsRead),
            FRS_WRITE_RESP => FrsWriteResponse::parse(payload).map(HubEvent::FrsWrite),
            GET_FEATURE_RESP => {
                trace!("Ignoring get feature response");
                return;
            }
            other => {
                debug!("Ignoring control report 0x{:02x}", other);
                return;
            }
        };
        match event {
            Ok(event) => events.push(event),
            Err(e) => warn!("Malformed control report 0x{:02x}: {}", report_id, e),
        }
    }

    fn handle_reports(&mut self, payload: &[u8], rx_time_us: u64, events: &mut HubEvents) {
        let mut cursor = 0;
        while cursor < payload.len() {
            let rest = &payload[cursor..];
            match rest[0] {
                BASE_TIMESTAMP | TIMESTAMP_REBASE => {
                    if rest.len() < TIMEBASE_RECORD_LEN {
                        debug!("Truncated timebase record");
                        return;
                    }
                    let mut buf = &rest[1..TIMEBASE_RECORD_LEN];
                    if rest[0] == BASE_TIMESTAMP {
                        let delta = buf.get_u32_le() as i64;
                        self.timebase_us = rx_time_us as i64 - delta * 100;
                    } else {
                        let rebase = buf.get_i32_le() as i64;
                        self.timebase_us += rebase * 100;
                    }
                    cursor += TIMEBASE_RECORD_LEN;
                }
                id => {
                    let Some(len) = report_len(id) else {
                        debug!("Unknown report id 0x{:02x}, dropping rest of packet", id);
                        return;
                    };
                    if rest.len() < len {
                        debug!("Truncated report 0x{:02x}", id);
                        return;
                    }
                    if let Ok(value) = SensorValue::decode(&rest[..len], self.timebase_us) {
                        events.push(HubEvent::Sensor(value));
                    }
                    cursor += len;
                }
            }
        }
    }
}
