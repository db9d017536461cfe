use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use transcript_crypto::key::ENVELOPE_KEY_VAR;
use transcript_crypto::{
    merkle_root, verify_proof, CanonicalHasher, EncryptedEnvelope, EnvKeyProvider, EnvelopeCipher,
    EnvelopeKey, KeyError, KeyProvider, MerkleProof, MerkleTree,
};
use transcript_issuer::{
    BatchIssued, ConfigError, InMemoryLedger, InMemoryRecordStore, IssueRequest, IssuedRecord,
    Issuer, IssuerConfig, LedgerStatus, VerificationOutcome,
};
use transcript_types::{CanonicalPayload, Fingerprint};

use crate::cli::*;

/// Dispatch a parsed command line.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Keygen => cmd_keygen(format),
        Command::Fingerprint(args) => cmd_fingerprint(args, format),
        Command::HashFile(args) => cmd_hash_file(args, format),
        Command::Seal(args) => cmd_seal(args, format),
        Command::Open(args) => cmd_open(args, format),
        Command::Merkle(args) => cmd_merkle(args.action, format),
        Command::Demo(args) => cmd_demo(args, format),
    }
}

fn cmd_keygen(format: OutputFormat) -> anyhow::Result<()> {
    let key = EnvelopeKey::generate();
    match format {
        OutputFormat::Text => println!("{}", key.to_hex()),
        OutputFormat::Json => print_json(&json!({ "key": key.to_hex() }))?,
    }
    Ok(())
}

fn cmd_fingerprint(args: FingerprintArgs, format: OutputFormat) -> anyhow::Result<()> {
    let payload = load_payload(&args.path)?;
    let fingerprint = CanonicalHasher::fingerprint(&payload);
    let canonical = String::from_utf8(CanonicalHasher::canonical_bytes(&payload))
        .context("canonical encoding is not UTF-8")?;

    match format {
        OutputFormat::Text => {
            println!("{}", fingerprint.to_hex().yellow());
            if args.canonical {
                println!("{canonical}");
            }
        }
        OutputFormat::Json => print_json(&json!({
            "fingerprint": fingerprint,
            "canonical": args.canonical.then_some(canonical),
        }))?,
    }
    Ok(())
}

fn cmd_hash_file(args: HashFileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let digest = CanonicalHasher::sha256_hex(&data);
    match format {
        OutputFormat::Text => println!("{}  {}", digest, args.path.display()),
        OutputFormat::Json => print_json(&json!({ "sha256": digest, "bytes": data.len() }))?,
    }
    Ok(())
}

fn cmd_seal(args: SealArgs, format: OutputFormat) -> anyhow::Result<()> {
    let payload = load_payload(&args.path)?;
    let key = resolve_key(&args.key)?;
    let envelope = EnvelopeCipher::new(&key).seal(&payload)?;
    let fingerprint = CanonicalHasher::fingerprint(&payload);

    if let Some(out) = &args.out {
        fs::write(out, envelope.to_hex()).with_context(|| format!("writing {}", out.display()))?;
        debug!(path = %out.display(), bytes = envelope.len(), "envelope written");
    }
    match (format, &args.out) {
        (OutputFormat::Json, _) => print_json(&json!({
            "fingerprint": fingerprint,
            "envelope": envelope,
        }))?,
        (OutputFormat::Text, Some(out)) => println!(
            "{} Sealed {} ({} bytes), fingerprint {}",
            "✓".green().bold(),
            out.display().to_string().bold(),
            envelope.len(),
            fingerprint.short_hex().yellow()
        ),
        (OutputFormat::Text, None) => println!("{}", envelope.to_hex()),
    }
    Ok(())
}

fn cmd_open(args: OpenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let envelope = EncryptedEnvelope::from_hex(raw.trim()).context("envelope is not valid hex")?;
    let key = resolve_key(&args.key)?;
    let payload = EnvelopeCipher::new(&key).open(&envelope)?;

    match format {
        OutputFormat::Text => println!("{}", String::from_utf8_lossy(&CanonicalHasher::canonical_bytes(&payload))),
        OutputFormat::Json => print_json(&payload.to_json_value())?,
    }
    Ok(())
}

fn cmd_merkle(action: MerkleAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        MerkleAction::Root { leaves } => {
            let leaves = parse_leaves(&leaves)?;
            let root = merkle_root(&leaves).context("a Merkle root needs at least one leaf")?;
            match format {
                OutputFormat::Text => println!("{}", root.to_hex().yellow()),
                OutputFormat::Json => print_json(&json!({ "root": root, "leaves": leaves.len() }))?,
            }
        }
        MerkleAction::Proof { index, leaves } => {
            let leaves = parse_leaves(&leaves)?;
            let (root, proof) = proof_for(leaves, index)?;
            match format {
                OutputFormat::Text => {
                    println!("Root: {}", root.to_hex().yellow());
                    println!("{}", serde_json::to_string_pretty(&proof)?);
                }
                OutputFormat::Json => print_json(&json!({ "root": root, "proof": proof }))?,
            }
        }
        MerkleAction::Verify { leaf, root, proof } => {
            let leaf = Fingerprint::from_hex(&leaf).context("invalid --leaf")?;
            let root = Fingerprint::from_hex(&root).context("invalid --root")?;
            let raw = fs::read_to_string(&proof)
                .with_context(|| format!("reading {}", proof.display()))?;
            let proof: MerkleProof = serde_json::from_str(&raw).context("invalid proof file")?;
            let valid = verify_proof(&leaf, &proof, &root);
            match format {
                OutputFormat::Text if valid => println!("{} Inclusion proof valid", "✓".green().bold()),
                OutputFormat::Text => println!("{} Inclusion proof invalid", "✗".red().bold()),
                OutputFormat::Json => print_json(&json!({ "valid": valid }))?,
            }
            if !valid {
                bail!("leaf {} is not included under root {}", leaf.short_hex(), root.short_hex());
            }
        }
    }
    Ok(())
}

fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => IssuerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IssuerConfig::default(),
    };
    let report = run_demo(&config)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_demo(&config, &report),
    }
    Ok(())
}

/// What the demo observed; printed as text or JSON.
#[derive(Debug, Serialize)]
struct DemoReport {
    ledger: LedgerStatus,
    single: IssuedRecord,
    single_outcome: VerificationOutcome,
    tamper_rejected: bool,
    batch: BatchIssued,
    batch_outcomes: Vec<VerificationOutcome>,
    forged_proof_rejected: bool,
}

fn run_demo(config: &IssuerConfig) -> anyhow::Result<DemoReport> {
    let key = match config.envelope_key() {
        Ok(key) => key,
        Err(ConfigError::Key(KeyError::Missing(_))) => {
            warn!("no envelope key configured, using an ephemeral key");
            EnvelopeKey::generate()
        }
        Err(e) => return Err(e.into()),
    };
    let issuer = Issuer::new(
        config.issuer_id(),
        &key,
        InMemoryLedger::with_network(config.ledger.channel.clone(), config.ledger.contract.clone()),
        InMemoryRecordStore::new(),
    );

    // Single issuance, then a verification against a tampered copy.
    let payload = CanonicalPayload::new()
        .with("course", "CS301")
        .with("grade", "A");
    let single = issuer.issue(IssueRequest::new("S12345", payload))?;
    let single_outcome = issuer.verify(&single.record_id, "demo")?;

    let mut tampered = issuer.record(&single.record_id)?;
    let mut bytes = tampered.envelope.clone().into_bytes();
    if let Some(byte) = bytes.get_mut(20) {
        *byte ^= 0xff;
    }
    tampered.envelope = EncryptedEnvelope::from_bytes(bytes);
    let tamper_rejected = issuer
        .verify_record(&tampered, &single.fingerprint)
        .is_err_and(|e| e.is_authentication_failure());

    // Batch of three under one anchor.
    let requests = [("S1001", "CS101", "A"), ("S1002", "CS102", "B+"), ("S1003", "CS103", "A-")]
        .into_iter()
        .map(|(subject, course, grade)| {
            IssueRequest::new(
                subject,
                CanonicalPayload::new().with("course", course).with("grade", grade),
            )
        })
        .collect();
    let batch = issuer.issue_batch(requests)?;
    let batch_outcomes = batch
        .records
        .iter()
        .map(|r| issuer.verify(&r.record_id, "demo"))
        .collect::<Result<Vec<_>, _>>()?;

    // Leaf 0's path replayed for leaf 1.
    let first = issuer.record(&batch.records[0].record_id)?;
    let forged_path = first.batch.map(|m| m.proof.path).unwrap_or_default();
    let forged = MerkleProof {
        leaf_index: 1,
        path: forged_path,
    };
    let forged_proof_rejected = !verify_proof(&batch.records[1].fingerprint, &forged, &batch.root);

    Ok(DemoReport {
        ledger: issuer.ledger_health(),
        single,
        single_outcome,
        tamper_rejected,
        batch,
        batch_outcomes,
        forged_proof_rejected,
    })
}

fn print_demo(config: &IssuerConfig, report: &DemoReport) {
    println!(
        "Issuer {} ({})",
        config.institution.id.bold(),
        config.institution.name
    );
    println!("Ledger: {}", report.ledger.detail.cyan());

    println!("\n{}", "Single issuance".bold());
    println!("  Record: {}", report.single.record_id.to_string().yellow());
    println!("  Fingerprint: {}", report.single.fingerprint.to_hex());
    println!("  Anchor: {}", report.single.tx.to_string().cyan());
    print_check("verification matched", report.single_outcome.matched);
    print_check("tampered envelope rejected", report.tamper_rejected);

    println!("\n{}", "Batch issuance".bold());
    println!("  Root: {}", report.batch.root.to_hex());
    println!("  Anchor: {}", report.batch.tx.to_string().cyan());
    for (record, outcome) in report.batch.records.iter().zip(&report.batch_outcomes) {
        print_check(
            &format!(
                "leaf {} {} verified",
                record.leaf_index.unwrap_or_default(),
                record.record_id
            ),
            outcome.matched,
        );
    }
    print_check("forged proof rejected", report.forged_proof_rejected);
}

fn print_check(label: &str, ok: bool) {
    if ok {
        println!("  {} {}", "✓".green().bold(), label);
    } else {
        println!("  {} {}", "✗".red().bold(), label);
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_payload(path: &Path) -> anyhow::Result<CanonicalPayload> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    CanonicalPayload::from_json_slice(&bytes)
        .with_context(|| format!("{} is not a JSON object payload", path.display()))
}

fn resolve_key(args: &KeyArgs) -> anyhow::Result<EnvelopeKey> {
    if let Some(hex) = &args.key {
        return EnvelopeKey::from_hex(hex).context("invalid --key");
    }
    let provider = EnvKeyProvider::from_default_env()
        .with_context(|| format!("pass --key or set {ENVELOPE_KEY_VAR}"))?;
    Ok(provider.envelope_key()?)
}

fn parse_leaves(raw: &[String]) -> anyhow::Result<Vec<Fingerprint>> {
    raw.iter()
        .enumerate()
        .map(|(i, s)| Fingerprint::from_hex(s).with_context(|| format!("leaf {i} is not a fingerprint")))
        .collect()
}

fn proof_for(leaves: Vec<Fingerprint>, index: usize) -> anyhow::Result<(Fingerprint, MerkleProof)> {
    if index >= leaves.len() {
        bail!("leaf index {index} out of range for {} leaves", leaves.len());
    }
    let mut tree = MerkleTree::from_leaves(leaves);
    let root = tree.root().context("a Merkle root needs at least one leaf")?;
    Ok((root, tree.proof(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fp(seed: &str) -> Fingerprint {
        Fingerprint::digest(seed.as_bytes())
    }

    #[test]
    fn load_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"grade":"A","course":"CS301"}}"#).unwrap();
        let payload = load_payload(file.path()).unwrap();
        assert_eq!(
            CanonicalHasher::fingerprint(&payload).to_hex(),
            "ca05c1b83e1683ebb084298fc1e661e5d1b4ed1838675f80b767c86c061b7a33"
        );
    }

    #[test]
    fn load_payload_rejects_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(load_payload(file.path()).is_err());
    }

    #[test]
    fn explicit_key_wins() {
        let key = EnvelopeKey::generate();
        let args = KeyArgs {
            key: Some(key.to_hex()),
        };
        assert_eq!(resolve_key(&args).unwrap().to_hex(), key.to_hex());
        assert!(resolve_key(&KeyArgs { key: Some("zz".into()) }).is_err());
    }

    #[test]
    fn parse_leaves_reports_bad_entry() {
        let err = parse_leaves(&[fp("a").to_hex(), "nothex".into()]).unwrap_err();
        assert!(err.to_string().contains("leaf 1"));
    }

    #[test]
    fn proof_for_checks_range() {
        let leaves = vec![fp("a"), fp("b"), fp("c")];
        let (root, proof) = proof_for(leaves.clone(), 2).unwrap();
        assert!(verify_proof(&leaves[2], &proof, &root));
        assert!(proof_for(leaves, 3).is_err());
    }

    #[test]
    fn seal_then_open_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let payload_path = dir.path().join("rec.json");
        let envelope_path = dir.path().join("rec.env");
        fs::write(&payload_path, r#"{"course":"CS301","grade":"A"}"#).unwrap();
        let key = EnvelopeKey::generate().to_hex();

        cmd_seal(
            SealArgs {
                path: payload_path,
                key: KeyArgs { key: Some(key.clone()) },
                out: Some(envelope_path.clone()),
            },
            OutputFormat::Text,
        )
        .unwrap();
        cmd_open(
            OpenArgs {
                path: envelope_path.clone(),
                key: KeyArgs { key: Some(key) },
            },
            OutputFormat::Json,
        )
        .unwrap();

        let wrong = EnvelopeKey::generate().to_hex();
        assert!(cmd_open(
            OpenArgs {
                path: envelope_path,
                key: KeyArgs { key: Some(wrong) },
            },
            OutputFormat::Text,
        )
        .is_err());
    }

    #[test]
    fn merkle_verify_fails_for_wrong_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let leaves = vec![fp("a"), fp("b"), fp("c")];
        let (root, proof) = proof_for(leaves.clone(), 1).unwrap();
        let proof_path = dir.path().join("proof.json");
        fs::write(&proof_path, serde_json::to_string(&proof).unwrap()).unwrap();

        let verify = |leaf: &Fingerprint| {
            cmd_merkle(
                MerkleAction::Verify {
                    leaf: leaf.to_hex(),
                    root: root.to_hex(),
                    proof: proof_path.clone(),
                },
                OutputFormat::Json,
            )
        };
        assert!(verify(&leaves[1]).is_ok());
        assert!(verify(&leaves[0]).is_err());
    }

    #[test]
    fn demo_runs_end_to_end() {
        let config = IssuerConfig {
            envelope: transcript_issuer::EnvelopeConfig {
                key: Some(EnvelopeKey::generate().to_hex()),
            },
            ..Default::default()
        };
        let report = run_demo(&config).unwrap();
        assert!(report.single_outcome.matched);
        assert!(report.tamper_rejected);
        assert_eq!(report.batch.records.len(), 3);
        assert!(report.batch_outcomes.iter().all(|o| o.matched));
        assert!(report.forged_proof_rejected);
        assert!(report.ledger.connected);
    }
}
