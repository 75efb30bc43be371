use clap::Parser;
use matching_core::EngineAddr;
use matching_engine::config::Config;
use matching_engine::engine::{self, MatchEngineState};
use matching_engine::grpc_server::MatchingServicer;
use matching_proto::{MatchingServiceClient, MatchingServiceServer};

/// Command-line overrides for the matching engine node. Anything left
/// unset falls back to the environment variables `Config::load_from_env`
/// reads (`ENGINE_ID`, `BIND_ADDRESS`, `DIRECTORY_ADDRESS`).
#[derive(Debug, Parser)]
#[command(author, version, about = "A single matching engine node")]
struct Args {
    /// Id this engine registers with the directory under.
    #[arg(long, env = "ENGINE_ID")]
    engine_id: Option<String>,

    /// Address the gRPC server binds to.
    #[arg(long, env = "BIND_ADDRESS")]
    bind_address: Option<std::net::SocketAddr>,

    /// Address of the exchange directory.
    #[arg(long, env = "DIRECTORY_ADDRESS")]
    directory_address: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    let body = async {
        tracing_subscriber::fmt::fmt()
            .with_file(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let config = Config::load_from_env().with_overrides(
            args.engine_id,
            args.bind_address,
            args.directory_address,
        );

        run(config).await.map_err(|err| Box::new(err) as Box<_>)
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed building the Runtime")
        .block_on(body)
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine_addr = EngineAddr::new(config.bind_address().to_string());

    let state = MatchEngineState::new(
        config.engine_id().to_owned(),
        engine_addr.clone(),
        config.authentication_key().to_owned(),
        config.peer_rpc_timeout(),
    );

    let (handle, _join) = engine::spawn(state, config.channel_capacity());

    register_with_directory(&config, &engine_addr, &handle).await?;

    let servicer = MatchingServicer::new(handle);

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(matching_proto::matching::FILE_DESCRIPTOR_SET)
        .build()?;

    tracing::info!(addr = %config.bind_address(), engine_id = %config.engine_id(), "starting matching engine");

    tonic::transport::Server::builder()
        .add_service(reflection)
        .add_service(MatchingServiceServer::new(servicer))
        .serve(config.bind_address())
        .await?;

    Ok(())
}

/// Registers this engine with the exchange directory, discovers its peers,
/// and connects to every one of them.
async fn register_with_directory(
    config: &Config,
    engine_addr: &EngineAddr,
    handle: &engine::EngineHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stub = MatchingServiceClient::connect(format!(
        "http://{}",
        config.directory_address()
    ))
    .await?;

    let register_resp = stub
        .register_me(matching_proto::RegisterMeRequest {
            engine_id: config.engine_id().to_owned(),
            engine_addr: engine_addr.as_str().to_owned(),
            engine_credentials: config.directory_credentials().to_owned(),
        })
        .await?
        .into_inner();

    if register_resp.status != "SUCCESSFUL" {
        tracing::error!(status = %register_resp.status, "registration with directory failed");
        return Ok(());
    }

    tracing::info!(engine_id = %config.engine_id(), "registered with exchange directory");

    let discover_resp = stub
        .discover_me(matching_proto::DiscoverMeRequest {
            engine_id: config.engine_id().to_owned(),
            engine_addr: engine_addr.as_str().to_owned(),
            engine_credentials: config.directory_credentials().to_owned(),
        })
        .await?
        .into_inner();

    if discover_resp.status != "SUCCESSFUL" {
        tracing::error!(status = %discover_resp.status, "peer discovery failed");
        return Ok(());
    }

    let peers: Vec<EngineAddr> = discover_resp
        .engine_addresses
        .into_iter()
        .filter(|addr| addr != engine_addr.as_str())
        .map(EngineAddr::new)
        .collect();

    tracing::info!(count = peers.len(), "discovered peer matching engines");
    handle.set_peers(peers).await?;

    Ok(())
}
