use log::{error, info};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use thiserror::Error;

use electionguard_core::ballot::{Ballot, BallotChoice, BallotContest, BallotEncryptor};
use electionguard_core::key_ceremony::{Guardian, GuardianRecord};
use electionguard_core::manifest::{BallotStyle, ChainingMode, Choice, Contest, Manifest};
use electionguard_core::parameters::{CryptographicParameters, GuardianParameters};
use electionguard_core::record::EncryptionRecord;
use electionguard_core::tally::{EncryptedTally, TallyAdmin, TallyGuardian};
use electionguard_core::verify;

#[derive(StructOpt)]
#[structopt(
    name = "electionguard",
    about = "Run a complete election in memory: key ceremony, ballot encryption, tally, \
             threshold decryption and verification."
)]
struct Options {
    /// Number of guardians.
    #[structopt(short = "n", long = "guardians", default_value = "3")]
    guardians: u32,

    /// Number of guardians needed to decrypt.
    #[structopt(short = "k", long = "threshold", default_value = "2")]
    threshold: u32,

    /// Number of synthetic ballots to encrypt.
    #[structopt(short = "b", long = "ballots", default_value = "10")]
    ballots: usize,

    /// Do not chain confirmation codes (overrides the manifest).
    #[structopt(long = "no-chaining")]
    no_chaining: bool,

    /// Identifier of the voting device.
    #[structopt(long = "device", default_value = "device-1")]
    device_id: String,

    /// A JSON manifest.  A one-contest demo manifest is used if not present.
    #[structopt(short = "m", long = "manifest", parse(from_os_str))]
    manifest: Option<PathBuf>,

    /// Directory to write the guardian record, encryption record, ballots and tally to.
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,

    /// Use the fast 512-bit test group instead of the standard 4096-bit group.
    #[structopt(long = "small-group")]
    small_group: bool,

    /// The log4rs configuration file.
    #[structopt(long = "log-config", default_value = "log4rs.yaml", parse(from_os_str))]
    log_config: PathBuf,
}

#[derive(Debug, Error)]
enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),
    #[error("JSON error: {0}")]
    JSON(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error(transparent)]
    Election(#[from] electionguard_core::errors::Error),
}

fn main() {
    let options = Options::from_args();
    if let Err(err) = run(options) {
        error!("{err}");
        eprintln!("{err}");
        std::process::exit(1)
    }
}

fn run(options: Options) -> Result<(), Error> {
    log4rs::init_file(&options.log_config, Default::default())
        .map_err(|e| Error::Logging(e.to_string()))?;
    info!("Initialised logging");

    let parameters = match options.small_group {
        true => CryptographicParameters::test_group(),
        false => CryptographicParameters::standard(),
    };
    let mut manifest = match &options.manifest {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => demo_manifest(),
    };
    if options.no_chaining {
        manifest.chaining_mode = ChainingMode::None;
    }

    let guardian_parameters = GuardianParameters::new(options.guardians, options.threshold)?;
    let (guardian_record, guardians) = key_ceremony(parameters, guardian_parameters)?;
    let record = EncryptionRecord::new(&guardian_record, manifest)?;

    let encryptor = BallotEncryptor::new(&record, &options.device_id)?;
    let plaintext = synthetic_ballots(&record.manifest, options.ballots);
    let ballots = encryptor.encrypt_all(&plaintext)?;
    info!("encrypted {} ballots", ballots.len());

    let group = parameters.group();
    let tally = EncryptedTally::from_ballots(group, &record.manifest, &ballots)?;

    let partials = guardians
        .iter()
        .take(options.threshold as usize)
        .filter_map(|g| g.secret_shares())
        .map(|shares| TallyGuardian::new(group, shares).decrypt(&tally))
        .collect::<Vec<_>>();
    let decrypted = TallyAdmin::new(&record).decrypt(&partials, &tally)?;

    let device_hashes = BTreeMap::from([(options.device_id.clone(), *encryptor.device_hash())]);
    verify::verify_election(parameters, &record, &ballots, &tally, &device_hashes)?;

    for (contest_id, counts) in &decrypted.contests {
        println!("{contest_id}");
        for (choice_id, count) in counts {
            println!("  {choice_id}: {count}");
        }
    }

    if let Some(dir) = &options.output {
        fs::create_dir_all(dir)?;
        write_json(&dir.join("guardian-record.json"), &guardian_record)?;
        write_json(&dir.join("encryption-record.json"), &record)?;
        let ballot_dir = dir.join("encrypted-ballots");
        fs::create_dir_all(&ballot_dir)?;
        for ballot in &ballots {
            write_json(&ballot_dir.join(format!("{}.json", ballot.id)), ballot)?;
        }
        write_json(&dir.join("tally.json"), &tally)?;
        write_json(&dir.join("decrypted-tally.json"), &decrypted)?;
        info!("wrote election record to {}", dir.display());
    }
    Ok(())
}

/// Run an honest ceremony between `n` in-memory guardians.
fn key_ceremony(
    parameters: &CryptographicParameters,
    guardian_parameters: GuardianParameters,
) -> Result<(GuardianRecord, Vec<Guardian<'_>>), Error> {
    let mut rng = rand::thread_rng();
    let mut guardians = (1..=guardian_parameters.n)
        .map(|i| Guardian::new(parameters, guardian_parameters, i))
        .collect::<Result<Vec<_>, _>>()?;

    let mut views = Vec::new();
    for guardian in guardians.iter_mut() {
        views.push(guardian.generate_keys(&mut rng)?.to_public_view());
    }
    let mut sent = Vec::new();
    for guardian in guardians.iter_mut() {
        sent.extend(guardian.encrypt_shares(&views, &mut rng)?);
    }
    for guardian in guardians.iter_mut() {
        let index = guardian.index();
        let received = sent
            .iter()
            .filter(|s| s.destination_index == index)
            .cloned()
            .collect::<Vec<_>>();
        guardian.decrypt_shares(&received)?;
    }

    let record = GuardianRecord::new(parameters, guardian_parameters, views)?;
    for guardian in guardians.iter_mut() {
        guardian.verify(&record)?;
    }
    Ok((record, guardians))
}

/// Ballots that each vote for one random choice in every contest of the first ballot style.
fn synthetic_ballots(manifest: &Manifest, count: usize) -> Vec<Ballot> {
    let mut rng = rand::thread_rng();
    let Some(style) = manifest.ballot_styles.first() else {
        return Vec::new();
    };
    (0..count)
        .map(|i| Ballot {
            id: format!("ballot-{i}"),
            ballot_style_id: style.id.clone(),
            contests: style
                .contest_ids
                .iter()
                .filter_map(|id| manifest.contest(id))
                .map(|contest| {
                    let pick = match contest.choices.len() {
                        0 => None,
                        n => Some(rng.gen_range(0..n)),
                    };
                    BallotContest {
                        contest_id: contest.id.clone(),
                        choices: contest
                            .choices
                            .iter()
                            .enumerate()
                            .map(|(j, choice)| BallotChoice {
                                choice_id: choice.id.clone(),
                                selection: u32::from(Some(j) == pick),
                            })
                            .collect(),
                        write_ins: 0,
                        contest_data: None,
                    }
                })
                .collect(),
            weight: 1,
        })
        .collect()
}

fn demo_manifest() -> Manifest {
    let choice = |id: &str, name: &str, index| Choice {
        id: id.to_owned(),
        name: name.to_owned(),
        index,
    };
    Manifest {
        election_id: "demo".to_owned(),
        contests: vec![Contest {
            id: "governor".to_owned(),
            name: "Governor".to_owned(),
            selection_limit: 1,
            option_selection_limit: 1,
            index: 1,
            choices: vec![
                choice("ada", "Ada Lovelace", 1),
                choice("grace", "Grace Hopper", 2),
                choice("alan", "Alan Turing", 3),
            ],
        }],
        ballot_styles: vec![BallotStyle {
            id: "all".to_owned(),
            name: "All voters".to_owned(),
            contest_ids: vec!["governor".to_owned()],
        }],
        optional_contest_data_max_length: 32,
        include_overvotes: true,
        include_nullvotes: true,
        include_undervotes: true,
        include_writeins: true,
        chaining_mode: ChainingMode::Simple,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
