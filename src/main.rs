//! Grievance portal CLI

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grievance_portal::{
    auth::IdentityGate,
    config::{Args, Command, IdentityArgs},
    forms::{AnonymousField, Notification, PublicField, PublicMode, SchedulerWidget, SubmitOutcome},
    HttpGateway, Portal, PortalConfig, PortalTab, SubmissionGateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("grievance_portal={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.portal_config();
    info!(
        require_login = config.require_login,
        policy = ?config.ambiguous_failure,
        "Grievance portal starting"
    );

    match args.command {
        Command::Verify { credential } => {
            let gate = IdentityGate::new(config.allowed_email_domain.clone());
            match gate.check(&credential) {
                Ok(identity) => {
                    println!("Admitted: {} <{}>", identity.display_name, identity.email);
                }
                Err(e) => {
                    error!("{}", e);
                    println!("{}", e.user_message());
                    std::process::exit(2);
                }
            }
        }

        Command::Anonymous {
            category,
            message,
            credential,
        } => {
            let mut portal = build_portal(&config, true)?;
            login_if_required(&mut portal, &config, credential.as_deref())?;

            let view = portal.anonymous_view_mut();
            view.apply_field_edit(AnonymousField::Category, &category);
            view.apply_field_edit(AnonymousField::Message, &message);

            let outcome = portal.submit_anonymous().await?;
            portal.flush_audits().await;
            exit_on_failure(report(&outcome));
        }

        Command::Grievance {
            identity,
            text,
            credential,
        } => {
            let mut portal = build_portal(&config, true)?;
            login_if_required(&mut portal, &config, credential.as_deref())?;
            portal.select_tab(PortalTab::Public);
            fill_identity(&mut portal, &identity);
            portal
                .public_view_mut()
                .apply_field_edit(PublicField::GrievanceText, &text);

            let outcome = portal.submit_grievance().await?;
            portal.flush_audits().await;
            exit_on_failure(report(&outcome));
        }

        Command::Book {
            identity,
            credential,
        } => {
            let mut portal = build_portal(&config, false)?;
            login_if_required(&mut portal, &config, credential.as_deref())?;
            portal.select_tab(PortalTab::Public);
            portal.set_public_mode(PublicMode::Meeting);
            fill_identity(&mut portal, &identity);

            let notification = portal.reveal_scheduler()?;
            print_notification(&notification);
            if let Some(url) = portal.booking_url() {
                println!("{}", url);
            }
            portal.flush_audits().await;
            exit_on_failure(notification.is_success());
        }
    }

    Ok(())
}

/// Submitting commands need the endpoint up front; booking does not post
fn build_portal(config: &PortalConfig, submits: bool) -> anyhow::Result<Portal<dyn SubmissionGateway>> {
    let gateway: Arc<dyn SubmissionGateway> = if submits {
        Arc::new(HttpGateway::new(config)?)
    } else {
        Arc::new(HttpGateway::lazy(
            config.script_url.as_deref(),
            config.ambiguous_failure,
        )?)
    };

    let mut portal = Portal::new(
        Arc::clone(&gateway),
        SchedulerWidget::new(config.scheduler_url.clone()),
    );
    if config.require_login {
        portal = portal.with_identity_gate(
            IdentityGate::new(config.allowed_email_domain.clone()).with_audit(gateway),
        );
    }
    Ok(portal)
}

fn login_if_required(
    portal: &mut Portal<dyn SubmissionGateway>,
    config: &PortalConfig,
    credential: Option<&str>,
) -> anyhow::Result<()> {
    if !config.require_login {
        return Ok(());
    }
    let credential =
        credential.ok_or_else(|| anyhow::anyhow!("--credential is required when login is required"))?;
    if let Err(e) = portal.login(credential) {
        println!("{}", e.user_message());
        return Err(e.into());
    }
    Ok(())
}

fn exit_on_failure(succeeded: bool) {
    if !succeeded {
        std::process::exit(1);
    }
}

fn fill_identity(portal: &mut Portal<dyn SubmissionGateway>, identity: &IdentityArgs) {
    let view = portal.public_view_mut();
    view.apply_field_edit(PublicField::Name, &identity.name);
    view.apply_field_edit(PublicField::RollNumber, &identity.roll_number);
    view.apply_field_edit(PublicField::Email, &identity.email);
}

/// Print the outcome; true when the record was delivered
fn report(outcome: &SubmitOutcome) -> bool {
    match outcome {
        SubmitOutcome::Invalid(errors) => {
            for field in errors.fields() {
                println!("{}: {}", field, errors.get(field).unwrap_or_default());
            }
        }
        SubmitOutcome::Busy => println!("A submission is already in progress."),
        other => {
            if let Some(notification) = other.notification() {
                print_notification(notification);
            }
        }
    }
    outcome.is_submitted()
}

fn print_notification(notification: &Notification) {
    let marker = if notification.is_success() { "ok" } else { "error" };
    println!("[{}] {}", marker, notification.message);
}
