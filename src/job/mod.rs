//! One balance evaluation cycle: login, fetch the token's balance, optionally
//! fold in today's usage, reschedule the next check from what was observed,
//! and deliver exactly one notification.

use crate::config::Config;
use crate::cron::SchedulerHandle;
use crate::gateway::{BalanceSnapshot, GatewayClient};
use crate::notify::{ButtonOrientation, CardButton, DingTalkNotifier, Payload};
use anyhow::Result;
use chrono::{Local, Timelike};

/// Run one check cycle. Any error is logged here and goes no further: a
/// failed cycle must never cancel future fires of the scheduler.
pub async fn run_cycle(config: &Config, scheduler: Option<&SchedulerHandle>) {
    if let Err(e) = check_balance(config, scheduler).await {
        tracing::error!("balance check cycle failed: {e:#}");
    }
}

async fn check_balance(config: &Config, scheduler: Option<&SchedulerHandle>) -> Result<()> {
    let profile = config.notify.active_webhook()?;
    let notifier = DingTalkNotifier::new(
        profile.webhook.clone(),
        profile.secret.clone(),
        &config.reliability,
    );
    let client = GatewayClient::new(&config.gateway, &config.reliability)?;

    if !client.login().await {
        notifier
            .send(Payload::text(format!("{} login failed", config.gateway.name)))
            .await;
        return Ok(());
    }

    let envelope = client.get_token(None).await?;

    let mut text = String::new();
    let mut buttons = Vec::new();

    if envelope.success {
        if let Some(ref data) = envelope.data {
            let snapshot = BalanceSnapshot::from_token(data, config.gateway.quota_per_unit.max(1));
            text.push_str(&balance_lines(&snapshot, &config.gateway.currency));

            if config.schedule.in_usage_window(Local::now().hour()) {
                match client.get_usage_window_summary(None, None).await {
                    Ok(summary) => {
                        text.push_str("  \n");
                        text.push_str(&format!(
                            "  \n  Today's spend: {}{:.3}",
                            config.gateway.currency, summary.total_cost
                        ));
                        text.push_str(&format!(
                            "  \n  Today's requests: {}",
                            summary.request_count
                        ));
                        text.push_str(&format!(
                            "  \n  Today's tokens: {}",
                            summary.tokens_display()
                        ));
                    }
                    Err(e) => tracing::error!("could not fetch today's usage: {e}"),
                }
            }

            let credit = snapshot.remaining_credit();
            if credit < config.schedule.low_balance_warning {
                text.push_str("  \n  *Balance is low - top up soon*");
                buttons.push(CardButton::new(
                    "Top up now",
                    topup_deep_link(&config.gateway.host),
                ));
            }

            if let Some(handle) = scheduler {
                let next = config.schedule.trigger_for_credit(credit);
                tracing::info!(
                    "credit {credit:.2}: next recurrence uses {next} (hourly below {:.2})",
                    config.schedule.hourly_threshold
                );
                handle.set_trigger(next);
            }
        } else {
            text.push_str(&format!(
                "{} balance query returned no token data",
                config.gateway.name
            ));
        }
    } else {
        let msg = envelope
            .message
            .unwrap_or_else(|| "unknown error".to_string());
        text.push_str(&format!(
            "{} balance query failed: {msg}",
            config.gateway.name
        ));
    }

    tracing::info!("notification body: {text}");
    notifier
        .send(Payload::action_card(
            format!("{} balance", config.gateway.name),
            text,
            buttons,
            ButtonOrientation::Vertical,
        ))
        .await;
    Ok(())
}

fn balance_lines(snapshot: &BalanceSnapshot, currency: &str) -> String {
    let mut text = format!(
        "**Token name:** {}  \n  **Token key:** {}",
        snapshot.token_name, snapshot.masked_key
    );
    if snapshot.unlimited {
        text.push_str(&format!(
            "  \n  **Remaining:** unlimited  \n  **Used:** {currency}{:.2}",
            snapshot.used_credit()
        ));
    } else {
        text.push_str(&format!(
            "  \n  **Remaining:** **{currency}{:.2}**  \n  **Used:** {currency}{:.2}",
            snapshot.remaining_credit(),
            snapshot.used_credit()
        ));
    }
    text
}

/// Deep link that opens the gateway's top-up page inside the DingTalk app.
fn topup_deep_link(host: &str) -> String {
    let target = format!("{}/panel/topup", host.trim_end_matches('/'));
    format!(
        "dingtalk://dingtalkclient/page/link?url={}&pc_slide=false",
        urlencoding::encode(&target)
    )
}
