//! DSF text writer.
//!
//! Line kinds:
//!
//! ```text
//! +5 TIME{s},SAMPLE_ID[x],ANG_POS_GLOBAL[wxyz]{quaternion},...   stream header
//! !5 coordinate_system="NED"                                    stream metadata
//! !5 name="RotationVector"
//! .5 12.345678901,17,0.5,0.5,0.5,-0.5,2.1,3                     data row
//! $ 12.345678901, reset(1)                                      async event
//! !RESET_CAUSE="PowerOnReset"                                   product ids
//! ! PN.0="10003606 3.2.324.7"
//! !scd="01,00,00,00,ff,7f,00,00"                               flash record
//! ```

use crate::sample_id::SampleIdExtender;
use crate::DsfError;
use logger_sh2::{AsyncEvent, ProductId, Quaternion, SensorData, SensorId, SensorValue, Vec3};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Output frame for vector and orientation values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// North-east-down
    #[default]
    Ned,
    /// East-north-up, the hub's native frame
    Enu,
}

impl Orientation {
    fn label(self) -> &'static str {
        match self {
            Orientation::Ned => "NED",
            Orientation::Enu => "ENU",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SampleIds {
    /// Stream has no usable counter
    Increment,
    /// Extend the report sequence number
    Sequence,
}

struct Schema {
    fields: &'static str,
    name: &'static str,
    sample_ids: SampleIds,
}

impl Schema {
    fn for_sensor(id: SensorId) -> Option<Self> {
        let (fields, name, sample_ids) = match id {
            SensorId::RotationVector => (
                "ANG_POS_GLOBAL[wxyz]{quaternion},ANG_POS_ACCURACY[x]{deg},STATUS[x]",
                "RotationVector",
                SampleIds::Increment,
            ),
            SensorId::GyroIntegratedRv => (
                "ANG_POS_GLOBAL[wxyz]{quaternion},ANG_VEL[xyz]{rad/s}",
                "GyroIntegratedRV",
                SampleIds::Increment,
            ),
            SensorId::GameRotationVector => (
                "ANG_POS_GLOBAL[wxyz]{quaternion}",
                "GameRotationVector",
                SampleIds::Increment,
            ),
            SensorId::GeomagneticRotationVector => (
                "ANG_POS_GLOBAL[wxyz]{quaternion},ANG_POS_ACCURACY[x]{deg},STATUS[x]",
                "GeomagneticRotationVector",
                SampleIds::Increment,
            ),
            SensorId::RawAccelerometer => (
                "LIN_ACC_GRAVITY[xyz]{ADC}",
                "RawAccelerometer",
                SampleIds::Sequence,
            ),
            SensorId::RawGyroscope => (
                "ANG_VEL[xyz]{ADC},TEMPERATURE[x]{ADC}",
                "RawGyroscope",
                SampleIds::Sequence,
            ),
            SensorId::RawMagnetometer => ("MAG[xyz]{ADC}", "RawMagnetometer", SampleIds::Sequence),
            SensorId::Accelerometer => (
                "LIN_ACC_GRAVITY[xyz]{m/s^2},STATUS[x]",
                "Accelerometer",
                SampleIds::Sequence,
            ),
            SensorId::GyroscopeUncalibrated => (
                "ANG_VEL[xyz]{rad/s},BIAS[xyz]{rad/s}",
                "UncalibratedGyroscope",
                SampleIds::Sequence,
            ),
            SensorId::GyroscopeCalibrated => {
                ("ANG_VEL[xyz]{rad/s}", "Gyroscope", SampleIds::Sequence)
            }
            SensorId::MagneticFieldCalibrated => (
                "MAG[xyz]{uTesla},STATUS[x]",
                "MagneticField",
                SampleIds::Sequence,
            ),
            SensorId::MagneticFieldUncalibrated => (
                "MAG_UNCAL[xyz]{uTesla},MAG_BIAS[xyz]{uTesla},STATUS[x]",
                "UncalibratedMagField",
                SampleIds::Sequence,
            ),
            SensorId::LinearAcceleration
            | SensorId::Gravity
            | SensorId::StepDetector
            | SensorId::PersonalActivityClassifier => return None,
        };
        Some(Self {
            fields,
            name,
            sample_ids,
        })
    }
}

type Fields = SmallVec<[f32; 8]>;

/// Writes sensor samples and session metadata as DSF text.
///
/// Stream state (sample id extender, header emitted) lives in the writer, so
/// one writer corresponds to one output file.
pub struct DsfWriter<W: Write> {
    out: W,
    orientation: Orientation,
    streams: HashMap<SensorId, SampleIdExtender>,
    rows_written: u64,
}

impl DsfWriter<BufWriter<File>> {
    /// Create (or truncate) the output file
    pub fn create(path: impl AsRef<Path>, orientation: Orientation) -> Result<Self, DsfError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DsfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Writing DSF output to {}", path.display());
        Ok(Self::new(BufWriter::new(file), orientation))
    }
}

impl<W: Write> DsfWriter<W> {
    /// Wrap an output stream
    pub fn new(out: W, orientation: Orientation) -> Self {
        Self {
            out,
            orientation,
            streams: HashMap::new(),
            rows_written: 0,
        }
    }

    /// Output frame
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Number of data rows written
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Write a free-form line, e.g. a `#` comment
    pub fn log_message(&mut self, message: &str) -> Result<(), DsfError> {
        writeln!(self.out, "{}", message)?;
        Ok(())
    }

    /// Write an asynchronous hub event
    pub fn log_async_event(&mut self, event: &AsyncEvent, time_s: f64) -> Result<(), DsfError> {
        write!(self.out, "$ {:.9},", time_s)?;
        match event {
            AsyncEvent::Reset => writeln!(self.out, " reset(1)")?,
            AsyncEvent::FrsChange(frs_type) => writeln!(self.out, " frsChange(0x{:x})", frs_type)?,
            AsyncEvent::Unknown(id) => writeln!(self.out, " unknownEvent({})", id)?,
        }
        Ok(())
    }

    /// Write reset cause and part numbers
    pub fn log_product_ids(&mut self, ids: &[ProductId]) -> Result<(), DsfError> {
        for (i, id) in ids.iter().enumerate() {
            if let Some(cause) = id.reset_cause.name() {
                writeln!(self.out, "!RESET_CAUSE=\"{}\"", cause)?;
            }
            writeln!(self.out, "! PN.{}=\"{}\"", i, id)?;
        }
        Ok(())
    }

    /// Write a flash record as comma separated hex bytes, low byte of each
    /// word first
    pub fn log_frs_record(&mut self, name: &str, words: &[u32]) -> Result<(), DsfError> {
        let bytes: Vec<String> = words
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .map(|byte| format!("{:02x}", byte))
            .collect();
        writeln!(self.out, "!{}=\"{}\"", name, bytes.join(","))?;
        Ok(())
    }

    /// Write one sample.
    ///
    /// The stream header goes out before the first row of each sensor.
    /// Returns `false` for sensors that have no output schema.
    pub fn log_sensor_value(&mut self, value: &SensorValue, time_s: f64) -> Result<bool, DsfError> {
        let Some(schema) = Schema::for_sensor(value.sensor_id) else {
            return Ok(false);
        };
        let id = value.sensor_id.id();

        let (first, sample_id) = {
            let stream = self.streams.entry(value.sensor_id).or_default();
            let first = stream.is_empty();
            let sample_id = match schema.sample_ids {
                SampleIds::Increment => stream.increment(),
                SampleIds::Sequence => stream.extend(value.sequence),
            };
            (first, sample_id)
        };

        if first {
            debug!("First sample from {:?}", value.sensor_id);
            self.write_header(id, &schema)?;
        }

        write!(self.out, ".{} {:.9},{}", id, time_s, sample_id)?;
        for field in self.fields(value) {
            write!(self.out, ",{}", field)?;
        }
        writeln!(self.out)?;

        self.rows_written += 1;
        Ok(true)
    }

    /// Flush and return the underlying stream
    pub fn finish(mut self) -> Result<W, DsfError> {
        self.out.flush()?;
        info!("DSF output closed after {} rows", self.rows_written);
        Ok(self.out)
    }

    fn write_header(&mut self, id: u8, schema: &Schema) -> Result<(), DsfError> {
        writeln!(self.out, "+{} TIME{{s}},SAMPLE_ID[x],{}", id, schema.fields)?;
        writeln!(
            self.out,
            "!{} coordinate_system=\"{}\"",
            id,
            self.orientation.label()
        )?;
        writeln!(self.out, "!{} name=\"{}\"", id, schema.name)?;
        Ok(())
    }

    fn axes(&self, v: Vec3) -> [f32; 3] {
        match self.orientation {
            Orientation::Ned => [v.y, v.x, -v.z],
            Orientation::Enu => [v.x, v.y, v.z],
        }
    }

    fn quat(&self, q: Quaternion) -> [f32; 4] {
        match self.orientation {
            Orientation::Ned => [q.real, q.j, q.i, -q.k],
            Orientation::Enu => [q.real, q.i, q.j, q.k],
        }
    }

    fn fields(&self, value: &SensorValue) -> Fields {
        let status = value.accuracy as f32;
        let mut f = Fields::new();
        match value.data {
            SensorData::RotationVector { quat, accuracy }
            | SensorData::GeomagneticRotationVector { quat, accuracy } => {
                f.extend(self.quat(quat));
                f.push(accuracy.to_degrees());
                f.push(status);
            }
            SensorData::GyroIntegratedRv {
                quat,
                angular_velocity,
            } => {
                f.extend(self.quat(quat));
                f.extend(self.axes(angular_velocity));
            }
            SensorData::GameRotationVector(quat) => f.extend(self.quat(quat)),
            SensorData::RawAccelerometer(raw) | SensorData::RawMagnetometer(raw) => {
                f.extend([raw.x as f32, raw.y as f32, raw.z as f32]);
            }
            SensorData::RawGyroscope { raw, temperature } => {
                f.extend([raw.x as f32, raw.y as f32, raw.z as f32, temperature as f32]);
            }
            SensorData::Accelerometer(v) | SensorData::MagneticField(v) => {
                f.extend(self.axes(v));
                f.push(status);
            }
            SensorData::Gyroscope(v) => f.extend(self.axes(v)),
            SensorData::GyroscopeUncalibrated { velocity, bias } => {
                f.extend(self.axes(velocity));
                f.extend(self.axes(bias));
            }
            SensorData::MagneticFieldUncalibrated { field, bias } => {
                f.extend(self.axes(field));
                f.extend(self.axes(bias));
                f.push(status);
            }
            SensorData::LinearAcceleration(_)
            | SensorData::Gravity(_)
            | SensorData::StepDetector { .. }
            | SensorData::PersonalActivityClassifier { .. } => {}
        }
        f
    }
}
