use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Conformer {index} has {found} atoms, expected {expected}")]
pub struct ConformerSizeError {
    pub index: usize,
    pub expected: usize,
    pub found: usize,
}

/// Externally sampled geometries of one molecule, one point per atom per frame.
///
/// Every frame is indexed by atom index, so all frames share the atom count of the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConformerSet {
    atom_count: usize,
    frames: Vec<Vec<Point3<f64>>>,
}

impl ConformerSet {
    pub fn new(atom_count: usize) -> Self {
        Self {
            atom_count,
            frames: Vec::new(),
        }
    }

    pub fn from_frames(frames: Vec<Vec<Point3<f64>>>) -> Result<Self, ConformerSizeError> {
        let atom_count = frames.first().map_or(0, Vec::len);
        let mut set = Self::new(atom_count);
        for frame in frames {
            set.push(frame)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, frame: Vec<Point3<f64>>) -> Result<(), ConformerSizeError> {
        if frame.len() != self.atom_count {
            return Err(ConformerSizeError {
                index: self.frames.len(),
                expected: self.atom_count,
                found: frame.len(),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Vec<Point3<f64>>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&[Point3<f64>]> {
        self.frames.get(index).map(Vec::as_slice)
    }
}
