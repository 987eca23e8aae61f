//! Job commands.

use anyhow::Result;
use orca_core::{Job, ResultRefs};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::ApiClient;

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    job: Job,
}

#[derive(Debug, Deserialize)]
struct JobList {
    jobs: Vec<Job>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct Message {
    message: String,
}

pub async fn create(client: &ApiClient, source_ref: &str) -> Result<()> {
    let request = client
        .request(Method::POST, "jobs")?
        .json(&json!({ "sourceRef": source_ref }));
    let JobEnvelope { job } = client.json(request).await?;

    println!("Created job {} ({})", job.id, job.status);
    Ok(())
}

pub async fn list(client: &ApiClient, limit: usize) -> Result<()> {
    let request = client
        .request(Method::GET, "jobs")?
        .query(&[("limit", limit)]);
    let JobList { jobs, total } = client.json(request).await?;

    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    println!("{:<36}  {:<10}  {:<20}  SOURCE", "ID", "STATUS", "CREATED");
    for job in &jobs {
        println!(
            "{:<36}  {:<10}  {:<20}  {}",
            job.id,
            job.status,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.source_ref
        );
    }
    println!("{total} job(s)");
    Ok(())
}

pub async fn show(client: &ApiClient, id: &str) -> Result<()> {
    let request = client.request(Method::GET, &format!("jobs/{}", urlencoding::encode(id)))?;
    let JobEnvelope { job } = client.json(request).await?;
    print_job(&job);
    Ok(())
}

pub async fn status(
    client: &ApiClient,
    id: &str,
    status: &str,
    error: Option<String>,
    refs: ResultRefs,
) -> Result<()> {
    let mut body = json!({ "status": status, "resultRefs": refs });
    if let Some(error) = error {
        body["errorMessage"] = json!(error);
    }

    let request = client
        .request(
            Method::PATCH,
            &format!("jobs/{}/status", urlencoding::encode(id)),
        )?
        .json(&body);
    let JobEnvelope { job } = client.json(request).await?;

    println!("Job {} is now {}", job.id, job.status);
    Ok(())
}

pub async fn delete(client: &ApiClient, id: &str, cascade: bool) -> Result<()> {
    let request = client
        .request(Method::DELETE, &format!("jobs/{}", urlencoding::encode(id)))?
        .query(&[("cascade", cascade)]);
    let Message { message } = client.json(request).await?;

    println!("{message}");
    Ok(())
}

fn print_job(job: &Job) {
    println!("ID:          {}", job.id);
    println!("Source:      {}", job.source_ref);
    println!("Status:      {}", job.status);
    if let Some(error) = &job.error_message {
        println!("Error:       {error}");
    }
    println!("Created:     {}", job.created_at.to_rfc3339());
    println!("Updated:     {}", job.updated_at.to_rfc3339());
    if let Some(completed) = job.completed_at {
        println!("Completed:   {}", completed.to_rfc3339());
    }

    let refs = &job.result_refs;
    let links = [
        ("Endpoint", &refs.endpoint),
        ("Model", &refs.model_path),
        ("Repository", &refs.repository_url),
        ("Deployment", &refs.deployment_url),
        ("GitHub CI", &refs.github_actions_url),
        ("GitLab CI", &refs.gitlab_ci_url),
        ("Jenkinsfile", &refs.jenkinsfile_url),
    ];
    for (label, value) in links {
        if let Some(value) = value {
            println!("{:<13}{value}", format!("{label}:"));
        }
    }

    let meta = &job.metadata;
    if let Some(count) = meta.python_files {
        println!("Python files: {count}");
    }
    if let Some(count) = meta.notebooks {
        println!("Notebooks:   {count}");
    }
    if let Some(frameworks) = &meta.frameworks {
        println!("Frameworks:  {}", frameworks.join(", "));
    }
}
