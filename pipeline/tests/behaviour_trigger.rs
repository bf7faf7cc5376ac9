//! Behaviour-driven tests for push-event triggering.
//!
//! Tests use the rstest-bdd v0.5.0 mutable world pattern.

use msquic_pipeline::trigger::{PathFilter, PushEvent, TriggerDecision};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Default)]
struct TriggerWorld {
    event: Option<PushEvent>,
    decision: Option<TriggerDecision>,
}

#[fixture]
fn world() -> TriggerWorld {
    TriggerWorld::default()
}

#[given("a push to \"{git_ref}\" changing \"{path}\"")]
fn given_push(world: &mut TriggerWorld, git_ref: String, path: String) {
    world.event = Some(PushEvent::new(git_ref.as_str(), vec![path]));
}

#[when("the trigger is evaluated")]
fn when_evaluated(world: &mut TriggerWorld) {
    let event = world.event.as_ref().expect("event set");
    world.decision = Some(PathFilter::default_ignore().evaluate(event));
}

#[then("the workflow is not triggered")]
fn then_not_triggered(world: &mut TriggerWorld) {
    assert_eq!(world.decision, Some(TriggerDecision::Ignored));
}

#[then("the workflow is triggered")]
fn then_triggered(world: &mut TriggerWorld) {
    assert_eq!(world.decision, Some(TriggerDecision::Triggered));
}

#[scenario(
    path = "tests/features/workflow_trigger.feature",
    name = "A README-only push to main does not trigger"
)]
fn scenario_readme_only(world: TriggerWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflow_trigger.feature",
    name = "A source change on main triggers"
)]
fn scenario_source_change(world: TriggerWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflow_trigger.feature",
    name = "A tag push triggers even when only docs changed"
)]
fn scenario_tag_push(world: TriggerWorld) {
    let _ = world;
}
