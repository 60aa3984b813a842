//! Scripted detectors for tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use image::GrayImage;

use crate::{FaceRegion, RegionDetector};

/// Returns the same regions for every image
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    regions: Vec<FaceRegion>,
}

impl FixedDetector {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }

    /// Detector that never finds anything
    pub fn none() -> Self {
        Self::default()
    }
}

impl RegionDetector for FixedDetector {
    fn detect(&self, _gray: &GrayImage) -> Vec<FaceRegion> {
        self.regions.clone()
    }
}

/// Plays back one scripted result per call, repeating the last one when exhausted
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: RefCell<VecDeque<Vec<FaceRegion>>>,
    last: RefCell<Vec<FaceRegion>>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<FaceRegion>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            ..Default::default()
        }
    }

    /// Shared handle counting `detect` calls, usable after the detector is boxed
    pub fn call_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl RegionDetector for ScriptedDetector {
    fn detect(&self, _gray: &GrayImage) -> Vec<FaceRegion> {
        self.calls.set(self.calls.get() + 1);
        if let Some(next) = self.script.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        self.last.borrow().clone()
    }
}
