//! Demonstration suite
//!
//! Exercises setup and teardown, variants, steps, flaky bodies, recovered
//! panics and push assertions without needing a live platform.

use anyhow::{bail, Result};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use stresscheck::push::{ChannelSubscriber, PushEvent, SubscriberStatus};
use stresscheck::{
    assert_eq, assert_push, assert_that, step, EventType, SetupOutput, TestDefinition, Variants,
};

#[derive(Debug, Deserialize)]
struct Namespace {
    name: String,
}

async fn done() -> Result<()> {
    Ok(())
}

fn step_test() -> TestDefinition {
    TestDefinition::new("Basic test to test steps")
        .description("This test uses steps in setup / teardown and test functions.")
        .author("QA")
        .tag("step")
        .setup(|_ctx, t| async move {
            step(&t, "Given I have a setup step", done()).await;
            let teardown = t.clone();
            Ok(SetupOutput::new()
                .with_data(format!("/{}", t.account_name()))
                .with_teardown(move || teardown.log("Then the teardown step")))
        })
        .function(|_ctx, t| async move {
            let account = t.setup_data::<String>().cloned().unwrap_or_default();
            step(&t, &format!("When I perform a test step in {account}"), done()).await;
            assert_that(&t, "account should be set up", !account.is_empty());
            Ok(())
        })
}

fn variants_test() -> TestDefinition {
    TestDefinition::new("Basic test to test variants")
        .description("This test uses variants in setup / teardown and test functions.")
        .author("QA")
        .tag("variants")
        .variants(
            Variants::new()
                .with_label("no-data-variant")
                .with("data-variant", "data-for-variant"),
        )
        .setup(|_ctx, t| async move {
            let (variant, _) = t.variant();
            let data = t.variant_data::<&str>().copied().unwrap_or("<none>");
            step(
                &t,
                &format!("Given I have a setup step for variant {variant} with data {data}"),
                done(),
            )
            .await;

            let teardown = t.clone();
            let line = format!("Then the teardown step for variant {variant} with data {data}");
            Ok(SetupOutput::new().with_teardown(move || teardown.log(line)))
        })
        .function(|_ctx, t| async move {
            let (variant, _) = t.variant();
            let data = t.variant_data::<&str>().copied().unwrap_or("<none>");
            step(
                &t,
                &format!("When I perform a test step for variant {variant} with data {data}"),
                done(),
            )
            .await;
            Ok(())
        })
}

fn namespace_test() -> TestDefinition {
    TestDefinition::new("Create a namespace and login")
        .description("This test creates a namespace and tries to authenticate.")
        .author("QA")
        .tags(["suite1", "namespaces"])
        .function(|ctx, t| async move {
            let namespace = t.test_namespace();
            let Some(api) = t.platform().public() else {
                t.log(format!("no public api configured, would create {namespace}"));
                return Ok(());
            };

            let payload = json!({ "name": namespace });
            tokio::select! {
                _ = ctx.done() => bail!("context done before {namespace} was created"),
                created = api.post::<_, serde_json::Value>("/namespaces", &payload) => {
                    created?;
                }
            }
            t.log(format!("created {namespace}"));
            Ok(())
        })
}

fn broken_setup_test() -> TestDefinition {
    TestDefinition::new("Create a processing unit with missing attribute")
        .description("This test creates a processing unit with attribute type missing.")
        .author("QA")
        .tags(["b", "c"])
        .setup(|_ctx, _t| async move {
            let attribute: Option<&str> = None;
            let kind = attribute.unwrap_or_else(|| panic!("processing unit type is missing"));
            Ok(SetupOutput::new().with_data(kind.to_string()))
        })
        .function(|_ctx, _t| async { Ok(()) })
}

fn flaky_test() -> TestDefinition {
    TestDefinition::new("Create a network policy and check traffic")
        .description("This test creates a network access policy and verifies communication.")
        .author("QA")
        .tags(["suite2", "flaky"])
        .function(|_ctx, t| async move {
            let (delay, roll) = {
                let mut rng = rand::rng();
                (rng.random_range(0..300u64), rng.random_range(0..10u32))
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if roll <= 8 {
                return Ok(());
            }

            t.log("create a namespace");
            t.log("add a policy");
            t.log("send traffic");
            bail!("Unable to send traffic")
        })
}

fn push_test() -> TestDefinition {
    TestDefinition::new("Receive a namespace creation push")
        .description("This test arms a push listener before creating a namespace.")
        .author("QA")
        .tags(["push", "namespaces"])
        .function(|_ctx, t| async move {
            let (mut subscriber, feed) = ChannelSubscriber::new(16);
            feed.status.send(SubscriberStatus::Connected).await?;

            let namespace = t.test_namespace();
            let listener = t
                .platform()
                .expect_push("namespace", EventType::Create)
                .with_positive_timeout(Duration::from_secs(5));
            let handle = t.arm_push(listener, &mut subscriber).await?;

            feed.events
                .send(PushEvent::new(
                    "namespace",
                    EventType::Create,
                    json!({ "name": namespace }),
                ))
                .await?;

            let created: Namespace = assert_push(handle).await?;
            assert_eq(&t, "pushed namespace should be the created one", created.name, namespace);
            Ok(())
        })
}

/// Every test of the demonstration suite
pub fn suite() -> Vec<TestDefinition> {
    vec![
        step_test(),
        variants_test(),
        namespace_test(),
        broken_setup_test(),
        flaky_test(),
        push_test(),
    ]
}
