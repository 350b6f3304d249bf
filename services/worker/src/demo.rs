use crate::infra::{parse_mock_fixture, Infrastructure, DEVELOPMENT_SP_ISSUER};
use chrono::{Duration, Utc};
use clap::Args;
use idv_proofing::accounts::{ProfileId, UserId};
use idv_proofing::config::{ProofingConfig, ResolutionVendor};
use idv_proofing::duplicates::ProfileRecord;
use idv_proofing::error::AppError;
use idv_proofing::fingerprint::ssn;
use idv_proofing::jobs::{JobEnvelope, JobOutcome, TracingTelemetry};
use idv_proofing::proofing::mock::{MockFixture, MockVendorConfig};
use idv_proofing::proofing::{AdjudicatedResult, ApplicantPii};
use idv_proofing::result_store::{ProofingSlot, ResultId, ResultStore};
use idv_proofing::router::ResolutionRequest;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const DEMO_SSN: &str = "900-12-3456";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Resolution vendor for the state-ID address check (lexis_nexis or socure)
    #[arg(long, value_parser = parse_resolution_vendor)]
    pub(crate) resolution_vendor: Option<ResolutionVendor>,
    /// Fixture the state-ID (AAMVA) mock answers with in the degraded-vendor scenario
    #[arg(long, value_parser = parse_mock_fixture, default_value = "timeout")]
    pub(crate) degraded_fixture: MockFixture,
    /// Enroll every applicant in shadow-mode comparison
    #[arg(long)]
    pub(crate) shadow_mode: bool,
    /// Print each stored result as pretty JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = demo_config(&args);
    let (infra, receiver) = Infrastructure::in_memory(
        &config,
        MockVendorConfig::default(),
        Arc::new(TracingTelemetry),
    );
    infra.seed_development_accounts();
    let mut demo = Demo {
        infra,
        receiver,
        json: args.json,
    };

    println!("Identity proofing demo");
    println!("======================");
    println!(
        "Resolution vendor: {:?} | shadow mode: {}",
        config.resolution_vendor,
        if config.shadow_mode_enabled { "on" } else { "off" }
    );

    demo.in_person_same_address()?;
    demo.duplicate_ssn(&config)?;
    demo.redelivery()?;
    demo.stale_job()?;
    demo.degraded_state_id(args.degraded_fixture)?;

    println!();
    println!("Duplicate confirmations:");
    for confirmation in demo.infra.confirmations.all() {
        println!(
            "  profile {:?} -> {:?} (confirmed_all: {})",
            confirmation.profile_id, confirmation.duplicate_profile_ids, confirmation.confirmed_all
        );
    }
    Ok(())
}

fn demo_config(args: &DemoArgs) -> ProofingConfig {
    let mut config = ProofingConfig::default();
    if let Some(vendor) = args.resolution_vendor {
        config.resolution_vendor = vendor;
    }
    config
        .eligible_one_account_providers
        .insert(DEVELOPMENT_SP_ISSUER.to_string());
    if args.shadow_mode {
        config.shadow_mode_enabled = true;
        config.shadow_mode_percent = 100;
    }
    config
}

fn parse_resolution_vendor(raw: &str) -> Result<ResolutionVendor, String> {
    raw.parse()
}

struct Demo {
    infra: Infrastructure,
    receiver: UnboundedReceiver<JobEnvelope>,
    json: bool,
}

impl Demo {
    fn in_person_same_address(&mut self) -> Result<(), AppError> {
        section("In-person applicant, identity document address matches residence");
        let pii = applicant_pii(DEMO_SSN).with("same_address_as_id", "true");
        let result_id = self.submit(1, &pii, true)?;
        self.drain()?;
        self.print_result(&result_id)
    }

    fn duplicate_ssn(&mut self, config: &ProofingConfig) -> Result<(), AppError> {
        section("Second account proofing with an already-verified SSN");
        let fingerprinter = config.fingerprinter();
        self.infra.profiles.insert(ProfileRecord {
            id: ProfileId(100),
            user_id: UserId(1),
            ssn_signature: fingerprinter.fingerprint_current(&ssn::format(DEMO_SSN)),
            verified: true,
        });
        let result_id = self.submit(2, &applicant_pii(DEMO_SSN), false)?;
        self.drain()?;
        self.print_result(&result_id)
    }

    fn redelivery(&mut self) -> Result<(), AppError> {
        section("Redelivered job");
        let result_id = self.submit(3, &applicant_pii("900-55-0001"), false)?;
        let Some(envelope) = self.next_envelope() else {
            return Ok(());
        };
        self.run(&envelope)?;
        self.run(&envelope.retry())?;
        self.drain()?;
        println!(
            "  deliveries: 2 | result writes: {}",
            self.infra.results.write_count(&result_id)
        );
        Ok(())
    }

    fn stale_job(&mut self) -> Result<(), AppError> {
        section("Job picked up after the staleness window");
        self.submit(3, &applicant_pii("900-55-0002"), false)?;
        let Some(mut envelope) = self.next_envelope() else {
            return Ok(());
        };
        envelope.enqueued_at = Utc::now() - Duration::minutes(10);
        let calls_before = self.total_vendor_calls();
        let outcome = self.run(&envelope)?;
        println!(
            "  outcome: {} | vendor calls: {}",
            outcome.label(),
            self.total_vendor_calls() - calls_before
        );
        Ok(())
    }

    fn degraded_state_id(&mut self, fixture: MockFixture) -> Result<(), AppError> {
        section("State-ID vendor degraded");
        self.infra
            .vendors
            .aamva
            .configure(MockVendorConfig::with_fixture(fixture));
        let result_id = self.submit(3, &applicant_pii("900-55-0003"), false)?;
        self.drain()?;
        self.infra
            .vendors
            .aamva
            .configure(MockVendorConfig::default());
        self.print_result(&result_id)
    }

    fn submit(&self, user_id: u64, pii: &ApplicantPii, ipp: bool) -> Result<ResultId, AppError> {
        let plaintext = serde_json::json!({ "applicant_pii": pii }).to_string();
        self.infra.proofing_api().submit(ResolutionRequest {
            result_id: None,
            encrypted_arguments: self.infra.encryptor.encrypt(&plaintext)?,
            trace_id: format!("demo-{user_id}-{}", Utc::now().timestamp_millis()),
            ipp_enrollment_in_progress: ipp,
            user_id: UserId(user_id),
            service_provider_issuer: Some(DEVELOPMENT_SP_ISSUER.to_string()),
            threatmetrix_session_id: Some("demo-session".to_string()),
            request_ip: Some("192.0.2.10".to_string()),
        })
    }

    fn next_envelope(&mut self) -> Option<JobEnvelope> {
        self.receiver.try_recv().ok()
    }

    fn run(&self, envelope: &JobEnvelope) -> Result<JobOutcome, AppError> {
        let outcome = self.infra.runner.run(envelope, Utc::now())?;
        println!("  {} -> {}", envelope.job.name(), outcome.label());
        Ok(outcome)
    }

    /// Runs queued jobs, including shadow-mode follow-ups, until the queue is empty.
    fn drain(&mut self) -> Result<(), AppError> {
        while let Some(envelope) = self.next_envelope() {
            self.run(&envelope)?;
        }
        Ok(())
    }

    fn total_vendor_calls(&self) -> usize {
        let vendors = &self.infra.vendors;
        vendors.threatmetrix.calls()
            + vendors.instant_verify.calls()
            + vendors.socure_id_plus.calls()
            + vendors.aamva.calls()
    }

    fn print_result(&self, result_id: &ResultId) -> Result<(), AppError> {
        let map = match self.infra.results.load(result_id)? {
            ProofingSlot::Complete(map) => map,
            ProofingSlot::Pending => {
                println!("  result {result_id}: pending");
                return Ok(());
            }
        };

        if self.json {
            let pretty = serde_json::to_string_pretty(&map)
                .map_err(|err| AppError::InvalidInput(err.to_string()))?;
            println!("{pretty}");
            return Ok(());
        }

        let result = AdjudicatedResult::from_map(map)
            .map_err(|err| AppError::InvalidInput(err.to_string()))?;
        println!(
            "  success: {} | ssn_is_unique: {} | timed_out: {}",
            result.success,
            result
                .ssn_is_unique
                .map_or_else(|| "n/a".to_string(), |unique| unique.to_string()),
            result.timed_out
        );
        println!(
            "  device: {} | resolution: {}",
            result.context.device_profiling_adjudication_reason,
            result.context.resolution_adjudication_reason
        );
        let stages = &result.context.stages;
        if stages.get("resolution") == stages.get("residential_address") {
            println!("  state-ID address check reused the residential address result");
        }
        for (stage, summary) in stages {
            println!(
                "    {stage:<20} {:<28} {}",
                summary.vendor_name,
                if summary.success { "pass" } else { "fail" }
            );
        }
        Ok(())
    }
}

fn section(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "-".repeat(title.len()));
}

fn applicant_pii(ssn: &str) -> ApplicantPii {
    ApplicantPii::new()
        .with("first_name", "Fakey")
        .with("last_name", "McFakerson")
        .with("dob", "1938-10-06")
        .with("ssn", ssn)
        .with("address1", "1 Fake Rd")
        .with("city", "Great Falls")
        .with("state", "MT")
        .with("zipcode", "59010")
        .with("identity_doc_address1", "1 Fake Rd")
        .with("identity_doc_city", "Great Falls")
        .with("identity_doc_address_state", "MT")
        .with("identity_doc_zipcode", "59010")
        .with("state_id_jurisdiction", "MT")
}
