use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Usage,
    VolumeOverflow,
    VolumeUnderflow,
    InvalidOperation,
    Compatibility,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    labware: Option<String>,
    well: Option<String>,
    current: Option<f64>,
    change: Option<f64>,
    threshold: Option<f64>,
    label: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            labware: None,
            well: None,
            current: None,
            change: None,
            threshold: None,
            label: None,
            source: None,
        }
    }

    pub(crate) fn volume_overflow(
        labware: &str,
        well: &str,
        current: f64,
        change: f64,
        threshold: f64,
        label: Option<&str>,
    ) -> Self {
        let mut err = Error::new(ErrorKind::VolumeOverflow)
            .with_labware(labware)
            .with_well(well)
            .with_current(current)
            .with_change(change)
            .with_threshold(threshold);
        if let Some(label) = label {
            err = err.with_label(label);
        }
        err
    }

    pub(crate) fn volume_underflow(
        labware: &str,
        well: &str,
        current: f64,
        change: f64,
        threshold: f64,
        label: Option<&str>,
    ) -> Self {
        let mut err = Error::new(ErrorKind::VolumeUnderflow)
            .with_labware(labware)
            .with_well(well)
            .with_current(current)
            .with_change(change)
            .with_threshold(threshold);
        if let Some(label) = label {
            err = err.with_label(label);
        }
        err
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn labware(&self) -> Option<&str> {
        self.labware.as_deref()
    }

    pub fn well(&self) -> Option<&str> {
        self.well.as_deref()
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn change(&self) -> Option<f64> {
        self.change
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_labware(mut self, labware: impl Into<String>) -> Self {
        self.labware = Some(labware.into());
        self
    }

    pub fn with_well(mut self, well: impl Into<String>) -> Self {
        self.well = Some(well.into());
        self
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_change(mut self, change: f64) -> Self {
        self.change = Some(change);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    fn volume_context(&self) -> Option<(&str, &str, f64, f64, f64)> {
        match (
            &self.labware,
            &self.well,
            self.current,
            self.change,
            self.threshold,
        ) {
            (Some(labware), Some(well), Some(current), Some(change), Some(threshold)) => {
                Some((labware, well, current, change, threshold))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.volume_context()) {
            (ErrorKind::VolumeOverflow, Some((labware, well, current, change, threshold))) => {
                write!(
                    f,
                    "too much volume for \"{labware}\".{well}: {current} + {change} > {threshold}"
                )?;
                if let Some(label) = &self.label {
                    write!(f, " in step {label}")?;
                }
            }
            (ErrorKind::VolumeUnderflow, Some((labware, well, current, change, threshold))) => {
                write!(
                    f,
                    "too little volume in \"{labware}\".{well}: {current} - {change} < {threshold}"
                )?;
                if let Some(label) = &self.label {
                    write!(f, " in step {label}")?;
                }
            }
            _ => {
                write!(f, "{:?}", self.kind)?;
                if let Some(message) = &self.message {
                    write!(f, ": {message}")?;
                }
                if let Some(labware) = &self.labware {
                    write!(f, " (labware: {labware})")?;
                }
                if let Some(well) = &self.well {
                    write!(f, " (well: {well})")?;
                }
                if let Some(label) = &self.label {
                    write!(f, " (label: {label})")?;
                }
            }
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
