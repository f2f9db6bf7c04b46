//!
//! console-gate CLI
//! ----------------
//! Drives the console's session, permission checks and navigation guard against the
//! records backend. Session state persists under the state directory between runs.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use console_gate::identity::{FileStorage, LoginRequest, SessionStorage};
use console_gate::routing::console::console_routes;
use console_gate::routing::{Location, NavigationOutcome};
use console_gate::{AuthContext, GateConfig};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} login <username> <password>\n  {program} logout\n  {program} status\n  {program} can [--all | --role] <name>...\n  {program} navigate <path>\n  {program} routes\n\nCommands:\n  login      authenticate and persist the session\n  logout     record the logout and clear the persisted session\n  status     show the restored session and its permission catalog\n  can        check permissions (any-of by default, all-of with --all) or roles (--role)\n  navigate   run the navigation guard for a path and print where it lands\n  routes     list console routes and their effective requirements\n\nEnvironment:\n  CONSOLE_GATE_API_BASE_URL   backend base url (default http://127.0.0.1:8080/api)\n  CONSOLE_GATE_STATE_DIR      persisted session directory (default .console-gate)\n  RUST_LOG                    log filter (default info)"
    );
}

fn describe(outcome: &NavigationOutcome) -> String {
    match outcome {
        NavigationOutcome::Committed(m) => format!("{} ({})", m.full_path, m.name.as_deref().unwrap_or("-")),
        NavigationOutcome::Superseded => "superseded".to_string(),
        NavigationOutcome::Failed(e) => format!("failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "console-gate".into());
    let Some(command) = args.get(1).map(String::as_str) else {
        print_usage(&program);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        print_usage(&program);
        return Ok(());
    }

    let config = GateConfig::from_env().context("invalid configuration")?;
    info!(target: "console_gate", "console-gate: api='{}', state_dir='{}'", config.api_base_url, config.state_dir.display());
    let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(&config.state_dir)?);
    let ctx = AuthContext::with_rest(config, storage, console_routes())?;
    let rest = &args[2..];

    match command {
        "login" => {
            let [user, pass] = rest else { return Err(anyhow!("usage: {} login <username> <password>", program)) };
            ctx.bootstrap().await;
            let (profile, outcome) = ctx.login(&LoginRequest::new(user.as_str(), pass.as_str())).await?;
            println!("logged in as {} (role: {})", profile.username, profile.role_name().unwrap_or("-"));
            println!("landed on {}", describe(&outcome));
        }
        "logout" => {
            ctx.bootstrap().await;
            let outcome = ctx.logout().await;
            println!("logged out; now at {}", describe(&outcome));
        }
        "status" => {
            if !ctx.bootstrap().await {
                println!("anonymous");
                return Ok(());
            }
            let snap = ctx.session().snapshot();
            println!("user: {}", snap.username().unwrap_or("-"));
            println!("role: {}", snap.role_name().unwrap_or("-"));
            let authz = ctx.loaded_authorizer().await?;
            let perms: Vec<&str> = authz.catalog().permissions.iter().map(String::as_str).collect();
            println!("admin: {}", authz.is_admin());
            println!("permissions ({}): {}", perms.len(), perms.join(", "));
        }
        "can" => {
            let all = rest.iter().any(|a| a == "--all");
            let role = rest.iter().any(|a| a == "--role");
            let names: Vec<&str> = rest.iter().map(String::as_str).filter(|a| !a.starts_with("--")).collect();
            if names.is_empty() {
                return Err(anyhow!("usage: {} can [--all | --role] <name>...", program));
            }
            ctx.bootstrap().await;
            let authz = ctx.loaded_authorizer().await?;
            let verdict = if role {
                authz.has_any_role(names.as_slice())
            } else if all {
                authz.has_all_permissions(names.as_slice())
            } else {
                authz.has_any_permission(names.as_slice())
            };
            println!("{}", if verdict { "allowed" } else { "denied" });
            if !verdict {
                std::process::exit(1);
            }
        }
        "navigate" => {
            let [path] = rest else { return Err(anyhow!("usage: {} navigate <path>", program)) };
            ctx.bootstrap().await;
            let outcome = ctx.navigate(Location::path(path)).await;
            println!("{}", describe(&outcome));
        }
        "routes" => {
            for (name, pattern, req) in ctx.navigator().table().entries() {
                let mut needs = Vec::new();
                if req.requires_auth {
                    needs.push("auth".to_string());
                }
                if !req.required_roles.is_empty() {
                    needs.push(format!("roles[{}]", req.required_roles.join("|")));
                }
                if !req.required_permissions.is_empty() {
                    needs.push(format!("perms[{}]", req.required_permissions.join("|")));
                }
                println!("{:<40} {:<34} {}", pattern, name.unwrap_or("-"), needs.join(" "));
            }
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command '{}'", other));
        }
    }
    Ok(())
}
