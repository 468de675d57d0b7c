// src/session.rs

//! The display session: Open → Configure → Present → Hold → Teardown.
//!
//! A [`Session`] owns the driver and every handle acquired through it. The
//! teardown transition runs exactly once, either explicitly from
//! [`Session::teardown`] or from `Drop` on any other exit path (early `?`
//! return or panic unwind).

use crate::display::{
    DisplayDriver, Element, ElementSpec, Geometry, OpenDisplay, PixelResource, UpdateTransaction,
};
use crate::frame::{read_frame, FrameSource};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use nix::sys::signal::Signal;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DisplayOpen,
    GeometryKnown,
    ResourceReady,
    Presenting,
    Holding,
    TornDown,
}

/// How long the presented frame stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPolicy {
    /// Until a termination signal arrives.
    Forever,
    For(Duration),
}

impl HoldPolicy {
    /// `0` means no timeout.
    pub fn from_secs(secs: u32) -> Self {
        match secs {
            0 => HoldPolicy::Forever,
            n => HoldPolicy::For(Duration::from_secs(u64::from(n))),
        }
    }

    pub fn duration(self) -> Option<Duration> {
        match self {
            HoldPolicy::Forever => None,
            HoldPolicy::For(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    TimedOut,
    Interrupted(Signal),
}

/// Blocking wait used by the Hold state.
pub trait HoldWait {
    fn hold(&mut self, policy: HoldPolicy) -> Result<HoldOutcome>;
}

pub struct Session {
    driver: Box<dyn DisplayDriver>,
    state: SessionState,
    update_priority: i32,
    display: Option<OpenDisplay>,
    geometry: Option<Geometry>,
    resource: Option<PixelResource>,
    element: Option<Element>,
}

impl Session {
    pub fn new(driver: Box<dyn DisplayDriver>, update_priority: i32) -> Self {
        Self {
            driver,
            state: SessionState::Idle,
            update_priority,
            display: None,
            geometry: None,
            resource: None,
            element: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> Result<()> {
        if self.state != expected {
            bail!("cannot {} in state {:?}", op, self.state);
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Idle → DisplayOpen.
    pub fn open(&mut self, id: u32) -> Result<()> {
        self.expect_state(SessionState::Idle, "open a display")?;
        let display = OpenDisplay::open(self.driver.as_mut(), id)?;
        self.display = Some(display);
        self.transition(SessionState::DisplayOpen);
        Ok(())
    }

    /// DisplayOpen → GeometryKnown. The result is fixed for the session.
    pub fn query_geometry(&mut self) -> Result<Geometry> {
        self.expect_state(SessionState::DisplayOpen, "query geometry")?;
        let Some(display) = self.display.as_ref() else {
            bail!("no display is open");
        };
        let geometry = display.geometry(self.driver.as_mut())?;
        info!("Session: display {} is {}", display.id(), geometry);
        self.geometry = Some(geometry);
        self.transition(SessionState::GeometryKnown);
        Ok(geometry)
    }

    /// GeometryKnown → ResourceReady.
    ///
    /// The frame is read in full before anything is allocated, so a short
    /// input never reaches the platform.
    pub fn ingest(&mut self, source: &mut dyn FrameSource) -> Result<()> {
        self.expect_state(SessionState::GeometryKnown, "ingest a frame")?;
        let Some(geometry) = self.geometry else {
            bail!("geometry is unknown");
        };
        let frame = read_frame(source, geometry)?;
        let resource = PixelResource::create(self.driver.as_mut(), geometry, frame.pixels())?;
        self.resource = Some(resource);
        self.transition(SessionState::ResourceReady);
        Ok(())
    }

    /// ResourceReady → Presenting. On return the element is on screen.
    pub fn present(&mut self, layer: i32) -> Result<()> {
        self.expect_state(SessionState::ResourceReady, "present")?;
        let (Some(display), Some(resource)) = (self.display.as_ref(), self.resource.as_ref())
        else {
            bail!("nothing to present");
        };
        let spec = ElementSpec::full_frame(display.handle(), resource, layer);

        let mut txn = UpdateTransaction::begin(self.driver.as_mut(), self.update_priority)?;
        let element = txn.bind(&spec)?;
        let bound_layer = element.layer();
        // Tracked before submit: if the submit fails, teardown still removes it.
        self.element = Some(element);
        txn.submit()?;

        info!("Session: element visible on layer {}", bound_layer);
        self.transition(SessionState::Presenting);
        Ok(())
    }

    /// Presenting → Holding, returning once the wait ends.
    pub fn hold(&mut self, wait: &mut dyn HoldWait, policy: HoldPolicy) -> Result<HoldOutcome> {
        self.expect_state(SessionState::Presenting, "hold")?;
        self.transition(SessionState::Holding);
        info!("Session: holding ({:?})", policy);
        wait.hold(policy)
    }

    /// Any → TornDown. Idempotent.
    ///
    /// Removes the element, deletes the resource, then closes the display.
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn teardown(&mut self) -> Result<()> {
        if self.state == SessionState::TornDown {
            return Ok(());
        }
        let mut first_error: Option<anyhow::Error> = None;
        let mut record = |result: Result<()>| {
            if let Err(err) = result {
                debug!("Session: teardown step failed: {:#}", err);
                first_error.get_or_insert(err);
            }
        };

        if let Some(element) = self.element.take() {
            record(remove_element(self.driver.as_mut(), self.update_priority, element));
        }
        if let Some(resource) = self.resource.take() {
            record(
                resource
                    .release(self.driver.as_mut())
                    .context("Failed to delete the pixel resource"),
            );
        }
        if let Some(display) = self.display.take() {
            record(
                display
                    .close(self.driver.as_mut())
                    .context("Failed to close the display"),
            );
        }

        self.transition(SessionState::TornDown);
        info!("Session: teardown complete");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn remove_element(driver: &mut dyn DisplayDriver, priority: i32, element: Element) -> Result<()> {
    let mut txn =
        UpdateTransaction::begin(driver, priority).context("Failed to start removal update")?;
    txn.unbind(element).context("Failed to remove the element")?;
    txn.submit().context("Failed to submit removal update")?;
    Ok(())
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        // Stays below the default filter: the caller prints the one diagnostic.
        info!("Session dropped in state {:?}; tearing down", self.state);
        if let Err(err) = self.teardown() {
            debug!("Session teardown failed: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests;
