// src/session/tests.rs

use super::*;
use crate::config::HeadlessConfig;
use crate::display::drivers::{HeadlessDisplayDriver, Ledger, Operation};
use crate::frame::ReaderSource;
use std::cell::RefCell;
use std::rc::Rc;

const RED_GREEN: [u8; 6] = [0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00];

/// Records the policy it was asked to hold for and returns a canned outcome.
struct FakeHold {
    outcome: HoldOutcome,
    asked: Option<HoldPolicy>,
}

impl FakeHold {
    fn new(outcome: HoldOutcome) -> Self {
        Self {
            outcome,
            asked: None,
        }
    }
}

impl HoldWait for FakeHold {
    fn hold(&mut self, policy: HoldPolicy) -> Result<HoldOutcome> {
        self.asked = Some(policy);
        Ok(self.outcome)
    }
}

fn session(width: u32, height: u32) -> (Session, Rc<RefCell<Ledger>>) {
    let driver = HeadlessDisplayDriver::new(HeadlessConfig::with_size(width, height));
    let ledger = driver.ledger();
    (Session::new(Box::new(driver), 0), ledger)
}

fn assert_clean(ledger: &Rc<RefCell<Ledger>>) {
    let ledger = ledger.borrow();
    assert!(ledger.elements().is_empty(), "elements left behind");
    assert!(ledger.resources().is_empty(), "resources left behind");
    assert!(ledger.open_displays().is_empty(), "display left open");
    assert!(ledger.pending_updates().is_empty(), "update left open");
}

fn present(session: &mut Session, pixels: &[u8], layer: i32) -> Result<()> {
    session.open(0)?;
    session.query_geometry()?;
    session.ingest(&mut ReaderSource(pixels))?;
    session.present(layer)
}

#[test_log::test]
fn it_should_present_the_red_green_frame_and_clean_up_after_an_interrupt() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    assert_eq!(session.state(), SessionState::Presenting);

    {
        let ledger = ledger.borrow();
        assert_eq!(ledger.elements().len(), 1);
        let element = ledger.elements().values().next().unwrap();
        assert_eq!(element.layer, 0);
        assert_eq!(element.alpha, crate::display::types::Alpha::opaque_pinned());
        let resource = &ledger.resources()[&element.resource];
        assert_eq!(resource.pixels.as_deref(), Some(&RED_GREEN[..]));
    }

    let mut wait = FakeHold::new(HoldOutcome::Interrupted(Signal::SIGINT));
    let outcome = session.hold(&mut wait, HoldPolicy::from_secs(0))?;
    assert_eq!(outcome, HoldOutcome::Interrupted(Signal::SIGINT));
    assert_eq!(wait.asked, Some(HoldPolicy::Forever));
    assert_eq!(session.state(), SessionState::Holding);

    session.teardown()?;
    assert_eq!(session.state(), SessionState::TornDown);
    assert_clean(&ledger);
    Ok(())
}

#[test]
fn it_should_tear_down_in_dependency_order() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    let before = ledger.borrow().calls().len();
    session.teardown()?;

    let ledger = ledger.borrow();
    assert_eq!(
        &ledger.calls()[before..],
        &[
            Operation::UpdateStart,
            Operation::ElementRemove,
            Operation::UpdateSubmitSync,
            Operation::ResourceDelete,
            Operation::DisplayClose,
        ]
    );
    Ok(())
}

#[test]
fn it_should_allow_teardown_twice() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    session.teardown()?;
    let calls = ledger.borrow().calls().len();
    session.teardown()?;
    assert_eq!(ledger.borrow().calls().len(), calls);
    Ok(())
}

#[test]
fn it_should_tear_down_when_dropped_mid_presentation() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    drop(session);
    assert_clean(&ledger);
    Ok(())
}

#[test]
fn it_should_fail_a_short_frame_before_binding() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    session.open(0)?;
    session.query_geometry()?;
    let err = session.ingest(&mut ReaderSource(&RED_GREEN[..5])).unwrap_err();
    assert!(err.to_string().contains("Expected 6 bytes"), "{:#}", err);
    assert_eq!(session.state(), SessionState::GeometryKnown);
    drop(session);

    let ledger = ledger.borrow();
    assert!(!ledger.calls().contains(&Operation::ResourceCreate));
    assert!(!ledger.calls().contains(&Operation::ElementAdd));
    assert!(ledger.open_displays().is_empty());
    Ok(())
}

#[test]
fn it_should_report_geometry_without_allocating() -> Result<()> {
    let (mut session, ledger) = session(1280, 720);
    session.open(0)?;
    let geometry = session.query_geometry()?;
    assert_eq!(geometry.to_string(), "1280x720");
    session.teardown()?;

    let ledger = ledger.borrow();
    assert_eq!(
        ledger.calls(),
        &[
            Operation::DisplayOpen,
            Operation::DisplayGetInfo,
            Operation::DisplayClose
        ]
    );
    Ok(())
}

#[test]
fn it_should_close_the_display_when_the_geometry_query_fails() {
    let (mut session, ledger) = session(2, 1);
    ledger.borrow_mut().fail_on(Operation::DisplayGetInfo);
    assert!(session.open(0).is_ok());
    let err = session.query_geometry().unwrap_err();
    assert!(err.to_string().contains("vc_dispmanx_display_get_info failed"));
    drop(session);
    assert_clean(&ledger);
}

#[test]
fn it_should_leave_nothing_to_unwind_when_open_fails() {
    let (mut session, ledger) = session(2, 1);
    ledger.borrow_mut().fail_on(Operation::DisplayOpen);
    assert!(session.open(0).is_err());
    assert_eq!(session.state(), SessionState::Idle);
    drop(session);
    assert_eq!(ledger.borrow().calls(), &[Operation::DisplayOpen]);
}

#[test]
fn it_should_release_the_resource_when_binding_fails() {
    let (mut session, ledger) = session(2, 1);
    ledger.borrow_mut().fail_on(Operation::ElementAdd);
    let err = present(&mut session, &RED_GREEN, 0).unwrap_err();
    assert!(err.to_string().contains("vc_dispmanx_element_add failed"));
    drop(session);
    assert_clean(&ledger);
}

#[test]
fn it_should_still_remove_the_element_when_the_submit_fails() {
    let (mut session, ledger) = session(2, 1);
    session.open(0).unwrap();
    session.query_geometry().unwrap();
    session.ingest(&mut ReaderSource(&RED_GREEN[..])).unwrap();
    // Fails the presenting submit, which also discards its staged add.
    ledger.borrow_mut().fail_on(Operation::UpdateSubmitSync);
    assert!(session.present(0).is_err());

    // The element never became visible, so its removal is rejected; the
    // remaining steps still run.
    assert!(session.teardown().is_err());
    let ledger = ledger.borrow();
    assert!(ledger.elements().is_empty());
    assert!(ledger.resources().is_empty());
    assert!(ledger.open_displays().is_empty());
}

#[test]
fn it_should_keep_closing_the_display_after_a_failed_removal() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    ledger.borrow_mut().fail_on(Operation::UpdateStart);

    let err = session.teardown().unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to start removal update"));
    assert_eq!(session.state(), SessionState::TornDown);
    let ledger = ledger.borrow();
    assert!(ledger.open_displays().is_empty());
    // The element still references the resource, so the platform keeps it.
    assert_eq!(ledger.resources().len(), 1);
    Ok(())
}

#[test]
fn it_should_pass_the_layer_through_untouched() -> Result<()> {
    let (mut session, ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, -128)?;
    let ledger = ledger.borrow();
    assert_eq!(ledger.elements().values().next().map(|e| e.layer), Some(-128));
    Ok(())
}

#[test]
fn it_should_forward_the_configured_timeout_to_the_hold() -> Result<()> {
    let (mut session, _ledger) = session(2, 1);
    present(&mut session, &RED_GREEN, 0)?;
    let mut wait = FakeHold::new(HoldOutcome::TimedOut);
    assert_eq!(
        session.hold(&mut wait, HoldPolicy::from_secs(3))?,
        HoldOutcome::TimedOut
    );
    assert_eq!(wait.asked, Some(HoldPolicy::For(Duration::from_secs(3))));
    Ok(())
}

#[test]
fn it_should_reject_steps_out_of_order() {
    let (mut session, _ledger) = session(2, 1);
    assert!(session.query_geometry().is_err());
    assert!(session.present(0).is_err());
    let mut wait = FakeHold::new(HoldOutcome::TimedOut);
    assert!(session.hold(&mut wait, HoldPolicy::Forever).is_err());
    assert_eq!(session.state(), SessionState::Idle);
}
