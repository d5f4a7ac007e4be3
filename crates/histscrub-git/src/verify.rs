//! Post-rewrite verification scan
//!
//! Streams every object reachable from any ref through `git cat-file --batch`
//! and searches the raw bytes for the original secret literals. The search
//! target is always the plaintext literal, never the redaction marker.

use std::path::Path;
use std::process::Stdio;

use histscrub_core::{ResidualHit, Result, RewritePlan, ScrubError, VerificationReport};
use memchr::memmem::Finder;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::command::{git, run, stderr_tail};

/// Scan all reachable history for the plan's literals. Read-only.
pub async fn scan_history(repo: &Path, plan: &RewritePlan) -> Result<VerificationReport> {
    let listing = run(repo, &["rev-list", "--all", "--objects"]).await?;
    let batch_input = object_ids(&listing);

    let finders: Vec<Finder<'_>> = plan
        .literals()
        .map(|literal| Finder::new(literal.as_bytes()))
        .collect();

    let mut child = git(repo)
        .args(["cat-file", "--batch"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ScrubError::Git(format!("Failed to run git cat-file: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ScrubError::Git("git cat-file stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ScrubError::Git("git cat-file stdout unavailable".to_string()))?;

    // Feed ids concurrently so a full stdout pipe cannot deadlock the child
    let writer = tokio::spawn(async move {
        stdin.write_all(&batch_input).await?;
        stdin.shutdown().await
    });

    let mut reader = BufReader::new(stdout);
    let mut header = Vec::new();
    let mut content = Zeroizing::new(Vec::new());
    let mut objects_scanned = 0;
    let mut residual = Vec::new();

    loop {
        header.clear();
        if reader.read_until(b'\n', &mut header).await? == 0 {
            break;
        }

        let Some((object_id, object_type, size)) = parse_header(&header)? else {
            continue;
        };

        content.clear();
        content.resize(size, 0);
        reader.read_exact(&mut content[..]).await?;
        let mut newline = [0u8; 1];
        reader.read_exact(&mut newline).await?;

        for (rule_index, finder) in finders.iter().enumerate() {
            if finder.find(&content).is_some() {
                let sources = plan.rules()[rule_index].sources().to_vec();
                warn!(
                    "Secret from {} still present in {} {}",
                    sources.join(", "),
                    object_type,
                    object_id
                );
                residual.push(ResidualHit {
                    object_id: object_id.clone(),
                    object_type: object_type.clone(),
                    rule_index,
                    sources,
                });
            }
        }
        objects_scanned += 1;
    }

    writer
        .await
        .map_err(|e| ScrubError::Git(format!("cat-file writer task failed: {}", e)))??;

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(ScrubError::Git(format!(
            "git cat-file --batch failed: {}",
            stderr_tail(&output.stderr)
        )));
    }

    info!(
        "Scanned {} objects for {} literal(s): {} residual match(es)",
        objects_scanned,
        plan.len(),
        residual.len()
    );

    Ok(VerificationReport {
        objects_scanned,
        residual,
    })
}

/// First column of `rev-list --objects` output, newline separated
fn object_ids(listing: &[u8]) -> Vec<u8> {
    let mut ids = Vec::with_capacity(listing.len());
    for line in listing.split(|b| *b == b'\n') {
        let id = line.split(|b| *b == b' ').next().unwrap_or_default();
        if !id.is_empty() {
            ids.extend_from_slice(id);
            ids.push(b'\n');
        }
    }
    ids
}

/// `<oid> <type> <size>` or `<oid> missing`
fn parse_header(header: &[u8]) -> Result<Option<(String, String, usize)>> {
    let line = String::from_utf8_lossy(header);
    let mut parts = line.split_whitespace();

    let object_id = parts.next().unwrap_or_default().to_string();
    let Some(object_type) = parts.next() else {
        return Err(ScrubError::Git(format!("Malformed cat-file header: {}", line.trim())));
    };

    if object_type == "missing" {
        debug!("Object {} listed but missing", object_id);
        return Ok(None);
    }

    let size = parts
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| ScrubError::Git(format!("Malformed cat-file header: {}", line.trim())))?;

    Ok(Some((object_id, object_type.to_string(), size)))
}
