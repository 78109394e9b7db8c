//! Built-in starter workflow

use serde_json::json;

use super::action::{Action, AgentAction};
use super::condition::{Condition, UiEvent};
use super::entity::{AgentId, Step, StepId, Workflow, WorkflowId};
use super::error::WorkflowError;

pub const STARTER_WORKFLOW_ID: &str = "defi-onboarding";
pub const STARTER_AGENT_ID: &str = "support-agent";

/// A four-step DeFi onboarding workflow:
/// welcome, connect wallet, offer yield on click, then collect feedback
/// once the wallet prompt was shown or the support agent judges it timely.
pub fn starter_workflow() -> Result<(Workflow, Vec<Step>), WorkflowError> {
    let workflow_id = WorkflowId::new(STARTER_WORKFLOW_ID)?;
    let agent_id = AgentId::new(STARTER_AGENT_ID)?;

    let welcome = StepId::new("welcome")?;
    let connect_wallet = StepId::new("connect-wallet")?;
    let offer_yield = StepId::new("offer-yield")?;
    let feedback = StepId::new("request-feedback")?;

    let steps = vec![
        Step::new(welcome.clone(), workflow_id.clone(), "Welcome to DeFi Portal")
            .with_description("Initial greeting for users entering the swap interface.")
            .with_index(0)
            .with_condition(Condition::Always)
            .with_action(Action::text("Welcome to DeFi Swap! Let's get you started.")),
        Step::new(connect_wallet.clone(), workflow_id.clone(), "Connect Wallet Prompt")
            .with_description("Prompt the user to connect their wallet after the welcome message.")
            .with_index(1)
            .with_condition(Condition::step(welcome))
            .with_action(Action::text("Please connect your wallet to start trading.")),
        Step::new(offer_yield, workflow_id.clone(), "Offer Yield Opportunity")
            .with_description("Show yield opportunities once the user clicks \"Explore Pools\".")
            .with_index(2)
            .with_condition(Condition::and(vec![
                Condition::step(connect_wallet.clone()),
                Condition::ui_event(UiEvent::OnClicked),
            ]))
            .with_action(Action::text("Discover high-yield farming pools now available!")),
        Step::new(feedback.clone(), workflow_id.clone(), "Request Feedback on Swap Experience")
            .with_description("Gather feedback after the wallet prompt or when the support agent asks.")
            .with_index(3)
            .with_condition(Condition::or(vec![
                Condition::step(connect_wallet),
                Condition::judged(
                    feedback,
                    agent_id.clone(),
                    "Should we ask the user for feedback now?",
                ),
            ]))
            .with_action(Action::agent(
                AgentAction::new(
                    agent_id,
                    "gpt-4o",
                    "Collect feedback on the swap process and user interface.",
                    Action::text("Thank you for helping us improve!"),
                )
                .with_args(json!({ "topic": "swap-experience" })),
            )),
    ];

    let workflow = Workflow::new(workflow_id, "DeFi Onboarding")
        .with_description("Guides new users from the first visit to their first swap.")
        .with_step_ids(steps.iter().map(|s| s.id().clone()).collect());

    Ok((workflow, steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::dependency::{dependency_edges, validate_graph};

    #[test]
    fn test_starter_workflow_is_valid() {
        let (workflow, steps) = starter_workflow().unwrap();

        assert_eq!(workflow.step_ids().len(), 4);
        assert!(steps.iter().all(|s| s.validate().is_ok()));
        assert!(validate_graph(&steps, &Default::default()).is_valid());
    }

    #[test]
    fn test_starter_workflow_edges() {
        let (_, steps) = starter_workflow().unwrap();
        let edges: Vec<String> = dependency_edges(&steps).into_iter().map(|e| e.id).collect();

        assert_eq!(
            edges,
            vec![
                "welcome-connect-wallet",
                "connect-wallet-offer-yield",
                "connect-wallet-request-feedback",
            ]
        );
    }
}
