use anyhow::Context;
use clap::Parser;
use cloud_iface::utils::logger::{init_logger, LogFormat};
use cloud_iface::utils::validation::Validate;
use cloud_iface::{bigquery, datastore, pubsub, runtimeconfig, CliConfig, ClientConfig, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_logger(format, cli.verbose)?;
    tracing::debug!("CLI config: {:?}", cli);

    cli.validate().context("invalid arguments")?;
    let config = cli
        .client_config()
        .context("could not load the client configuration")?;

    match cli.command {
        Command::Publish {
            topic,
            message,
            attributes,
        } => publish(&config, &topic, message, attributes).await,
        Command::ListVariables { config_name } => list_variables(&config, &config_name).await,
        Command::GetEntity {
            kind,
            name,
            id,
            namespace,
        } => {
            let mut key = match (name, id) {
                (Some(name), _) => datastore::Key::with_name(kind, name, None),
                (None, Some(id)) => datastore::Key::with_id(kind, id, None),
                (None, None) => anyhow::bail!("either --name or --id is required"),
            };
            key.namespace = namespace;
            get_entity(&config, &key).await
        }
        Command::Query {
            sql,
            max_rows,
            location,
        } => query(&config, &sql, max_rows, location.as_deref()).await,
    }
}

async fn publish(
    config: &ClientConfig,
    topic: &str,
    message: String,
    attributes: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let client = pubsub::iface::adapt_client(pubsub::Client::from_config(config)?);
    let msg = attributes
        .into_iter()
        .fold(pubsub::Message::new(message.into_bytes()), |msg, (k, v)| {
            msg.with_attribute(k, v)
        });

    let mut result = client
        .topic(topic)
        .publish(pubsub::iface::adapt_message(msg).as_ref())?;
    let id = result.get().await.context("publish failed")?;
    println!("{}", id);
    Ok(())
}

async fn list_variables(config: &ClientConfig, config_name: &str) -> anyhow::Result<()> {
    let service = runtimeconfig::iface::adapt_service(runtimeconfig::Service::from_config(config)?);
    let parent = format!("projects/{}/configs/{}", config.project_id, config_name);
    let response = service
        .projects()
        .configs()
        .variables()
        .list(&parent)
        .doit(&[])
        .await
        .with_context(|| format!("could not list variables of {}", parent))?;

    for variable in response.variables {
        match (&variable.text, variable.decoded_value()?) {
            (Some(text), _) => println!("{}\t{}", variable.name, text),
            (None, Some(value)) => println!("{}\t{}", variable.name, String::from_utf8_lossy(&value)),
            (None, None) => println!("{}", variable.name),
        }
    }
    Ok(())
}

async fn get_entity(config: &ClientConfig, key: &datastore::Key) -> anyhow::Result<()> {
    let client = datastore::iface::adapt_client(datastore::Client::from_config(config)?);
    let entity = client
        .get(key)
        .await
        .with_context(|| format!("could not get {}", key))?;
    let json: serde_json::Value = entity.deserialize()?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    client.close()?;
    Ok(())
}

async fn query(
    config: &ClientConfig,
    sql: &str,
    max_rows: usize,
    location: Option<&str>,
) -> anyhow::Result<()> {
    let client = bigquery::iface::adapt_client(bigquery::Client::from_config(config)?);
    if let Some(location) = location {
        client.set_location(location);
    }

    let mut rows = client.query(sql).read().await.context("query failed")?;
    let mut printed = 0;
    while printed < max_rows {
        let Some(row) = rows.next().await? else {
            break;
        };
        println!("{}", bigquery::row_to_json(&rows.schema(), &row));
        printed += 1;
    }
    tracing::info!("Printed {} of {} rows", printed, rows.total_rows());
    client.close()?;
    Ok(())
}
