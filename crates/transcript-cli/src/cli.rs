use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "transcript",
    about = "Transcript: tamper-evident academic records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new envelope key (hex)
    Keygen,
    /// Canonical fingerprint of a JSON payload file
    Fingerprint(FingerprintArgs),
    /// Raw SHA-256 of a file
    HashFile(HashFileArgs),
    /// Encrypt a JSON payload file into an envelope
    Seal(SealArgs),
    /// Decrypt an envelope back into its payload
    Open(OpenArgs),
    /// Merkle tree tooling
    Merkle(MerkleArgs),
    /// Run single and batch issuance end to end in memory
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct FingerprintArgs {
    pub path: PathBuf,
    /// Also print the canonical encoding
    #[arg(long)]
    pub canonical: bool,
}

#[derive(Args)]
pub struct HashFileArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct KeyArgs {
    /// Envelope key as 64 hex chars; defaults to $TRANSCRIPT_ENVELOPE_KEY
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Args)]
pub struct SealArgs {
    pub path: PathBuf,
    #[command(flatten)]
    pub key: KeyArgs,
    /// Write the hex envelope here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct OpenArgs {
    /// File holding a hex-encoded envelope
    pub path: PathBuf,
    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Args)]
pub struct MerkleArgs {
    #[command(subcommand)]
    pub action: MerkleAction,
}

#[derive(Subcommand)]
pub enum MerkleAction {
    /// Root over fingerprints given in order
    Root { leaves: Vec<String> },
    /// Inclusion proof for the leaf at `index`
    Proof {
        #[arg(short, long)]
        index: usize,
        leaves: Vec<String>,
    },
    /// Check a proof file against a leaf and root
    Verify {
        #[arg(long)]
        leaf: String,
        #[arg(long)]
        root: String,
        #[arg(long)]
        proof: PathBuf,
    },
}

#[derive(Args)]
pub struct DemoArgs {
    /// Issuer config (TOML); built-in defaults otherwise
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
