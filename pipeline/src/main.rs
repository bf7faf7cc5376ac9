//! msquic pipeline CLI entrypoint.
//!
//! Each subcommand runs one stage of the release workflow against the local
//! artifact store; `run` drives the whole workflow in-process.

use clap::Parser;
use msquic_pipeline::artifact::LocalArtifactStore;
use msquic_pipeline::cli::{BuildArgs, Cli, Command, ExtractArgs, ReleaseArgs, RunArgs, TriggerArgs};
use msquic_pipeline::config::{HostEnvironment, PipelineConfig};
use msquic_pipeline::download::StoreArtifactDownloader;
use msquic_pipeline::error::{PipelineError, Result};
use msquic_pipeline::executor::SystemCommandExecutor;
use msquic_pipeline::extractor::{self, PACKAGE_NAME_OUTPUT};
use msquic_pipeline::git_ref::GitRef;
use msquic_pipeline::job::JobContext;
use msquic_pipeline::matrix::CancellationFlag;
use msquic_pipeline::output::{DryRunRelease, release_summary, run_summary, write_stderr_line};
use msquic_pipeline::release::{
    self, DryRunPublisher, GithubReleasePublisher, ReleasePublisher, ReleaseRequest,
};
use msquic_pipeline::step_output::StepOutputs;
use msquic_pipeline::trigger::PushEvent;
use msquic_pipeline::workflow::{Conclusion, Workflow};
use std::io::Write;

/// Name of the step output carrying the trigger decision.
const TRIGGERED_OUTPUT: &str = "triggered";

struct RunContext<'a> {
    cli: &'a Cli,
    config: PipelineConfig,
    env: HostEnvironment,
    outputs: StepOutputs,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let env = HostEnvironment::from_env();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    config.apply_environment(&env);
    config.resolve_against_current_dir()?;
    let outputs = StepOutputs::from_path(env.output.as_deref());
    let context = RunContext {
        cli,
        config,
        env,
        outputs,
    };

    match &cli.command {
        Command::CheckTrigger(args) => check_trigger(&context, args, stderr),
        Command::Build(args) => build(&context, args, stderr),
        Command::Extract(args) => extract(&context, args, stderr),
        Command::Release(args) => release(&context, args, stderr),
        Command::Run(args) => run_workflow(&context, args, stderr),
    }
}

/// Evaluates the path filter and exposes `triggered=true|false`.
fn check_trigger(context: &RunContext<'_>, args: &TriggerArgs, stderr: &mut dyn Write) -> Result<()> {
    let store = LocalArtifactStore::new(context.config.workspace.artifacts_dir());
    let executor = SystemCommandExecutor::default();
    let workflow = Workflow::new(&context.config, &executor, &store, &DryRunPublisher);
    let event = PushEvent::new(args.git_ref.as_str(), args.changed.clone());
    let triggered = workflow.trigger(&event)?.is_triggered();

    context
        .outputs
        .set(TRIGGERED_OUTPUT, if triggered { "true" } else { "false" })?;
    if !context.cli.quiet {
        let verdict = if triggered { "triggers" } else { "does not trigger" };
        write_stderr_line(stderr, format!("Push to {} {verdict} the workflow", args.git_ref));
    }
    Ok(())
}

/// Runs one platform job and exposes its package name.
fn build(context: &RunContext<'_>, args: &BuildArgs, stderr: &mut dyn Write) -> Result<()> {
    let config = &context.config;
    let executor = SystemCommandExecutor::with_timeout(config.packaging.timeout());
    let store = LocalArtifactStore::new(config.workspace.artifacts_dir());
    let jobs_dir = config.workspace.jobs_dir();
    let job = JobContext {
        source: &config.source,
        packaging: &config.packaging,
        jobs_dir: &jobs_dir,
        executor: &executor,
        store: &store,
    };

    if !context.cli.quiet {
        write_stderr_line(stderr, format!("Building {}...", args.platform));
    }
    let outcome = job.run(args.platform, &CancellationFlag::new());
    let Some(package_name) = outcome.package_name().cloned() else {
        return Err(PipelineError::JobFailed { outcome });
    };
    context
        .outputs
        .set(PACKAGE_NAME_OUTPUT, package_name.as_str())?;
    if !context.cli.quiet {
        write_stderr_line(stderr, format!("Built {package_name}"));
    }
    Ok(())
}

/// Reads a descriptor left by an earlier packaging run.
fn extract(context: &RunContext<'_>, args: &ExtractArgs, stderr: &mut dyn Write) -> Result<()> {
    let config = &context.config;
    let extraction = extractor::extract(&args.source, &config.packaging, args.platform)?;
    extractor::write_outputs(&extraction, &context.outputs)?;
    if !args.no_upload {
        let store = LocalArtifactStore::new(config.workspace.artifacts_dir());
        extractor::upload(&extraction, &store)?;
    }
    if !context.cli.quiet {
        write_stderr_line(
            stderr,
            format!("{}: {}", args.platform, extraction.package_name),
        );
    }
    Ok(())
}

/// Collects every platform's package from the store and publishes them.
///
/// This stage runs after the build jobs, so the build results are not
/// re-checked here; the ref must still be a release tag.
fn release(context: &RunContext<'_>, args: &ReleaseArgs, stderr: &mut dyn Write) -> Result<()> {
    let config = &context.config;
    let git_ref = GitRef::new(args.git_ref.as_str());
    if !git_ref.is_release_tag(&config.trigger.tag_marker) {
        return Err(PipelineError::NotAReleaseRef {
            git_ref: git_ref.to_string(),
            marker: config.trigger.tag_marker.clone(),
        });
    }
    let tag = git_ref.release_tag();

    let store = LocalArtifactStore::new(config.workspace.artifacts_dir());
    let downloader = StoreArtifactDownloader::new(&store);
    let paths = release::aggregate(&downloader, &config.workspace.downloads_dir())?;
    release::write_outputs(&paths, &context.outputs)?;

    if args.dry_run {
        let info = DryRunRelease {
            tag,
            repository: config.release.repository.as_deref(),
            files: &paths,
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(());
    }

    let publisher = GithubReleasePublisher::from_config(&config.release, &context.env)
        .map_err(release::ReleaseError::from)?;
    let request = ReleaseRequest {
        draft: config.release.draft,
        ..ReleaseRequest::new(tag, paths)
    };
    let published = publisher
        .publish(&request)
        .map_err(release::ReleaseError::from)?;
    if !context.cli.quiet {
        write_stderr_line(stderr, release_summary(&published));
    }
    Ok(())
}

/// Runs the trigger check, the build matrix, and the release in-process.
fn run_workflow(context: &RunContext<'_>, args: &RunArgs, stderr: &mut dyn Write) -> Result<()> {
    let config = &context.config;
    let executor = SystemCommandExecutor::with_timeout(config.packaging.timeout());
    let store = LocalArtifactStore::new(config.workspace.artifacts_dir());
    let publisher: Box<dyn ReleasePublisher> = if args.dry_run {
        Box::new(DryRunPublisher)
    } else {
        Box::new(
            GithubReleasePublisher::from_config(&config.release, &context.env)
                .map_err(release::ReleaseError::from)?,
        )
    };
    let workflow = Workflow::new(config, &executor, &store, publisher.as_ref());

    let event = PushEvent::new(args.git_ref.as_str(), args.changed.clone());
    if !workflow.trigger(&event)?.is_triggered() {
        if !context.cli.quiet {
            write_stderr_line(
                stderr,
                format!("Push to {} does not trigger the workflow", args.git_ref),
            );
        }
        return Ok(());
    }

    if !context.cli.quiet {
        write_stderr_line(stderr, format!("Workflow triggered by {}", args.git_ref));
    }
    let run = workflow.run(&event.git_ref)?;
    release::write_outputs(run.package_paths(), &context.outputs)?;
    if !context.cli.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, run_summary(&run));
    }
    match run.conclusion() {
        Conclusion::Failed => Err(PipelineError::RunFailed {
            conclusion: Conclusion::Failed,
        }),
        Conclusion::Released | Conclusion::Built => Ok(()),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
