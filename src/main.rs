use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use foglio::{
    application::{
        assist::AssistService,
        audit::AuditService,
        bookmarks::BookmarkService,
        collaborators::CollaboratorService,
        comments::CommentService,
        error::AppError,
        identity::IdentityService,
        jobs::{
            JobWorkerContext, due_sweep_schedule, process_due_sweep_job, process_publish_post_job,
        },
        media::MediaService,
        moderation::ModerationService,
        posts::PostService,
        reactions::ReactionService,
        render::RenderService,
        repos::{
            AuditRepo, BookmarksRepo, CollaboratorsRepo, CommentsRepo, JobsRepo, MediaRepo,
            PostsRepo, PostsWriteRepo, ReactionsRepo, SettingsRepo, TaxonomyRepo, UsersRepo,
        },
        taxonomy::TaxonomyService,
        users::UserService,
    },
    config,
    domain::types::JobType,
    infra::{
        assist::OpenAiAssistProvider,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState, RateLimiter},
        identity::ProviderTokenVerifier,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let _ = init_repositories(&settings).await?;
    info!(target = "foglio::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(
        http_repositories.clone(),
        job_repositories.clone(),
        &settings,
    )?;

    let monitor_handle = spawn_job_monitor(job_repositories, app.job_context, &settings.jobs);

    let result = serve_http(&settings, app.state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

struct ApplicationContext {
    state: AppState,
    job_context: JobWorkerContext,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    // The job queue keeps its schema under the `apalis` namespace.
    PostgresStorage::setup(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = http_repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = http_repositories.clone();
    let collaborators_repo: Arc<dyn CollaboratorsRepo> = http_repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = http_repositories.clone();
    let reactions_repo: Arc<dyn ReactionsRepo> = http_repositories.clone();
    let bookmarks_repo: Arc<dyn BookmarksRepo> = http_repositories.clone();
    let taxonomy_repo: Arc<dyn TaxonomyRepo> = http_repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = http_repositories.clone();
    let media_repo: Arc<dyn MediaRepo> = http_repositories.clone();
    let audit_repo: Arc<dyn AuditRepo> = http_repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = http_repositories.clone();
    let settings_repo: Arc<dyn SettingsRepo> = http_repositories.clone();

    let renderer = RenderService::new();
    let audit = AuditService::new(audit_repo);

    let posts = Arc::new(PostService::new(
        posts_repo.clone(),
        posts_write_repo,
        collaborators_repo.clone(),
        taxonomy_repo.clone(),
        jobs_repo.clone(),
        renderer.clone(),
        audit.clone(),
    ));
    let moderation = Arc::new(ModerationService::new(posts_repo.clone()));
    let collaborators = Arc::new(CollaboratorService::new(
        posts_repo.clone(),
        users_repo.clone(),
        collaborators_repo,
        settings_repo.clone(),
        audit.clone(),
    ));
    let comments = Arc::new(CommentService::new(
        posts_repo.clone(),
        comments_repo,
        settings_repo.clone(),
        renderer.clone(),
        audit.clone(),
    ));
    let reactions = Arc::new(ReactionService::new(posts_repo.clone(), reactions_repo));
    let bookmarks = Arc::new(BookmarkService::new(posts_repo.clone(), bookmarks_repo));
    let taxonomy = Arc::new(TaxonomyService::new(taxonomy_repo, audit.clone()));
    let users = Arc::new(UserService::new(
        users_repo.clone(),
        settings_repo,
        audit.clone(),
    ));
    let media = Arc::new(MediaService::new(media_repo, audit.clone()));

    let token_verifier = Arc::new(ProviderTokenVerifier::new(
        &settings.identity.base_url,
        settings.identity.api_key.clone(),
        settings.identity.cache_ttl,
    )?);
    let identity = Arc::new(IdentityService::new(token_verifier, users_repo));

    let assist_provider = Arc::new(OpenAiAssistProvider::new(
        &settings.assist.base_url,
        settings.assist.api_key.clone(),
        settings.assist.model.clone(),
    )?);
    let assist = Arc::new(AssistService::new(assist_provider, audit.clone()));

    let rate_limiter = Arc::new(RateLimiter::new(
        std::time::Duration::from_secs(settings.rate_limit.window_seconds.get() as u64),
        settings.rate_limit.max_requests.get(),
    ));

    let state = AppState {
        identity,
        posts: posts.clone(),
        moderation,
        collaborators,
        comments,
        reactions,
        bookmarks,
        taxonomy,
        users,
        media,
        assist,
        audit,
        jobs: jobs_repo,
        rate_limiter,
        webhook_secret: settings.identity.webhook_secret.as_str().into(),
    };

    // Workers read through their own pool so a saturated HTTP pool cannot
    // starve scheduled publication.
    let job_posts_reader: Arc<dyn PostsRepo> = job_repositories.clone();
    let job_context = JobWorkerContext {
        posts,
        posts_reader: job_posts_reader,
    };

    Ok(ApplicationContext { state, job_context })
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    jobs: &config::JobsSettings,
) -> tokio::task::JoinHandle<()> {
    let publish_post_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::PublishPost.as_str()),
    );

    let publish_post_concurrency = jobs.publish_concurrency.get() as usize;

    let publish_post_worker = WorkerBuilder::new("publish-post-worker")
        .concurrency(publish_post_concurrency)
        .data(context.clone())
        .backend(publish_post_storage)
        .build_fn(process_publish_post_job);

    // Safety net behind the queued jobs; publishes anything the queue missed.
    let due_sweep_worker = WorkerBuilder::new("due-sweep-worker")
        .data(context)
        .backend(CronStream::new(due_sweep_schedule()))
        .build_fn(process_due_sweep_job);

    let monitor = Monitor::new()
        .register(publish_post_worker)
        .register(due_sweep_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "foglio::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: std::time::Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to listen for shutdown signal");
        return;
    }
    info!(
        target = "foglio::serve",
        grace_secs = grace.as_secs(),
        "shutdown requested, draining connections"
    );
}

#[cfg(test)]
mod tests {}
