//! Output machine: the sink the renderer pulls audio from.
//!
//! A hardware output is clocked by a device and cannot be pulled; a generic
//! output renders on demand, which is what offline rendering needs.

use ms_ir::AudioBuffer;

use crate::error::RenderError;
use crate::machine::{unsupported, Machine, MachineInfo, MachineType, Property};

static HARDWARE_INFO: MachineInfo = MachineInfo {
    name: "Hardware Output",
    short_name: "HW Out",
    machine_type: MachineType::Output,
};

static GENERIC_INFO: MachineInfo = MachineInfo {
    name: "Generic Output",
    short_name: "Out",
    machine_type: MachineType::Output,
};

/// Which kind of sink this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Hardware,
    Generic,
}

pub struct OutputMachine {
    kind: OutputKind,
    sample_rate: Option<u32>,
    max_frames: usize,
}

impl OutputMachine {
    pub fn hardware() -> Self {
        Self::new(OutputKind::Hardware)
    }

    pub fn generic() -> Self {
        Self::new(OutputKind::Generic)
    }

    fn new(kind: OutputKind) -> Self {
        Self {
            kind,
            sample_rate: None,
            max_frames: ms_ir::BLOCK_SIZE,
        }
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

impl Machine for OutputMachine {
    fn info(&self) -> &MachineInfo {
        match self.kind {
            OutputKind::Hardware => &HARDWARE_INFO,
            OutputKind::Generic => &GENERIC_INFO,
        }
    }

    fn set_property(&mut self, property: Property) -> Result<(), RenderError> {
        match property {
            Property::SampleRate(rate) if rate > 0 => self.sample_rate = Some(rate),
            Property::MaxFramesPerSlice(frames) if frames > 0 => self.max_frames = frames,
            other => return Err(unsupported(self.info(), other)),
        }
        Ok(())
    }

    fn work(&mut self, buffer: &mut AudioBuffer) -> Result<(), RenderError> {
        if self.kind == OutputKind::Hardware {
            return Err(RenderError::HardwareOutput);
        }
        if self.sample_rate.is_none() {
            return Err(RenderError::NotInitialized(GENERIC_INFO.name));
        }
        if buffer.frames() > self.max_frames {
            return Err(RenderError::SliceTooLarge {
                requested: buffer.frames(),
                max: self.max_frames,
            });
        }
        // Inputs arrive pre-mixed; the sink passes them through.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_output_cannot_be_pulled() {
        let mut out = OutputMachine::hardware();
        out.set_property(Property::SampleRate(16000)).unwrap();
        let mut buf = AudioBuffer::stereo(8);
        assert_eq!(out.work(&mut buf), Err(RenderError::HardwareOutput));
    }

    #[test]
    fn generic_output_passes_input_through() {
        let mut out = OutputMachine::generic();
        out.set_property(Property::SampleRate(16000)).unwrap();
        let mut buf = AudioBuffer::stereo(4);
        buf.add_frame(2, 0.5, -0.5);
        out.work(&mut buf).unwrap();
        assert_eq!(buf.channel(0)[2], 0.5);
        assert_eq!(buf.channel(1)[2], -0.5);
    }

    #[test]
    fn output_rejects_instrument_properties() {
        let mut out = OutputMachine::generic();
        assert!(out.set_property(Property::CpuLoad(0.8)).is_err());
        assert!(out.set_property(Property::OfflineRender(true)).is_err());
        assert!(out.set_property(Property::SampleRate(0)).is_err());
    }
}
