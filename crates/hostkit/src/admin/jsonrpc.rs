//! JSON-RPC administrative backend.
//!
//! Talks to the instance's `/jsonrpc` endpoint: `common.login` once,
//! then `object.execute_kw` for every record operation.

use crate::admin::AdminApi;
use crate::error::{Error, Result};
use crate::types::{ModuleInfo, ModuleState, UserInfo};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    /// `Some(Value::Null)` for an explicit `"result": null`, `None` when absent
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    message: Option<String>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Connection to a running instance over JSON-RPC.
pub struct JsonRpcAdmin {
    agent: ureq::Agent,
    endpoint: String,
    database: String,
    password: String,
    uid: i64,
    next_id: AtomicU64,
}

impl JsonRpcAdmin {
    /// Authenticate against `url` and return a ready connection.
    pub fn connect(url: &str, database: &str, login: &str, password: &str) -> Result<Self> {
        let mut admin = Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint: endpoint(url),
            database: database.to_string(),
            password: password.to_string(),
            uid: 0,
            next_id: AtomicU64::new(1),
        };

        let result = admin.call(
            "common",
            "login",
            vec![json!(database), json!(login), json!(password)],
        )?;
        admin.uid = result.as_i64().ok_or_else(|| Error::AuthFailed {
            login: login.to_string(),
            database: database.to_string(),
        })?;
        log::debug!("Authenticated as uid {} on '{}'", admin.uid, database);

        Ok(admin)
    }

    fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id,
        };

        let response: RpcResponse = self
            .agent
            .post(&self.endpoint)
            .header("User-Agent", "forklift")
            .send_json(&request)?
            .body_mut()
            .read_json()?;

        into_result(response, method)
    }

    fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> Result<Value> {
        log::trace!("{model}.{method} {args}");
        self.call(
            "object",
            "execute_kw",
            execute_kw_args(&self.database, self.uid, &self.password, model, method, args, kwargs),
        )
        .map_err(|e| match e {
            Error::Remote { message, .. } => Error::Remote {
                method: format!("{model}.{method}"),
                message,
            },
            other => other,
        })
    }

    fn search_read(&self, model: &str, domain: Value, fields: &[&str]) -> Result<Option<Map<String, Value>>> {
        let rows = self.execute_kw(
            model,
            "search_read",
            json!([domain]),
            json!({ "fields": fields, "limit": 1 }),
        )?;
        match rows {
            Value::Array(mut rows) if !rows.is_empty() => match rows.swap_remove(0) {
                Value::Object(row) => Ok(Some(row)),
                other => Err(Error::InvalidResponse(format!("{model} row is not an object: {other}"))),
            },
            Value::Array(_) => Ok(None),
            other => Err(Error::InvalidResponse(format!("{model}.search_read returned {other}"))),
        }
    }
}

impl AdminApi for JsonRpcAdmin {
    fn find_module(&self, name: &str) -> Result<Option<ModuleInfo>> {
        let Some(row) = self.search_read(
            "ir.module.module",
            json!([["name", "=", name]]),
            &["id", "name", "state"],
        )?
        else {
            return Ok(None);
        };

        Ok(Some(ModuleInfo {
            id: int_field(&row, "id")?,
            name: name.to_string(),
            state: ModuleState::parse(row.get("state").and_then(Value::as_str).unwrap_or_default()),
        }))
    }

    fn install_module(&self, module: &ModuleInfo) -> Result<()> {
        self.execute_kw(
            "ir.module.module",
            "button_immediate_install",
            json!([[module.id]]),
            json!({}),
        )?;
        Ok(())
    }

    fn find_user(&self, login: &str) -> Result<Option<UserInfo>> {
        let Some(row) = self.search_read(
            "res.users",
            json!([["login", "=", login]]),
            &["id", "login", "groups_id", "company_id"],
        )?
        else {
            return Ok(None);
        };

        let group_ids = row
            .get("groups_id")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        Ok(Some(UserInfo {
            id: int_field(&row, "id")?,
            login: login.to_string(),
            group_ids,
            company_id: row.get("company_id").and_then(many2one_id),
        }))
    }

    fn resolve_group(&self, xml_id: &str) -> Result<Option<i64>> {
        let Some((module, name)) = xml_id.split_once('.') else {
            return Ok(None);
        };
        let row = self.search_read(
            "ir.model.data",
            json!([["module", "=", module], ["name", "=", name], ["model", "=", "res.groups"]]),
            &["res_id"],
        )?;
        row.map(|r| int_field(&r, "res_id")).transpose()
    }

    fn add_user_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        // (4, id) links without touching other memberships
        self.execute_kw(
            "res.users",
            "write",
            json!([[user_id], { "groups_id": [[4, group_id]] }]),
            json!({}),
        )?;
        Ok(())
    }

    fn apply_settings(&self, settings: &[(String, bool)]) -> Result<()> {
        let values: Map<String, Value> = settings
            .iter()
            .map(|(name, value)| (name.clone(), Value::Bool(*value)))
            .collect();

        let id = self.execute_kw("res.config.settings", "create", json!([values]), json!({}))?;
        let id = id
            .as_i64()
            .ok_or_else(|| Error::InvalidResponse(format!("res.config.settings.create returned {id}")))?;

        self.execute_kw("res.config.settings", "execute", json!([[id]]), json!({}))?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        // Every execute_kw call runs in its own transaction
        log::debug!("Changes are committed per call");
        Ok(())
    }

    fn find_chart_template(&self, name: &str) -> Result<Option<i64>> {
        let row = self.search_read("account.chart.template", json!([["name", "=", name]]), &["id"])?;
        row.map(|r| int_field(&r, "id")).transpose()
    }

    fn load_chart_template(&self, template_id: i64, company_id: Option<i64>) -> Result<()> {
        // try_loading binds the template itself and does nothing for a
        // company that already has one, so the company is only selected
        let kwargs = match company_id {
            Some(id) => json!({ "context": { "allowed_company_ids": [id] } }),
            None => json!({}),
        };
        self.execute_kw("account.chart.template", "try_loading", json!([[template_id]]), kwargs)?;
        Ok(())
    }
}

fn endpoint(url: &str) -> String {
    format!("{}/jsonrpc", url.trim_end_matches('/'))
}

fn execute_kw_args(
    database: &str,
    uid: i64,
    password: &str,
    model: &str,
    method: &str,
    args: Value,
    kwargs: Value,
) -> Vec<Value> {
    vec![
        json!(database),
        json!(uid),
        json!(password),
        json!(model),
        json!(method),
        args,
        kwargs,
    ]
}

fn into_result(response: RpcResponse, method: &str) -> Result<Value> {
    if let Some(error) = response.error {
        let message = error.data.and_then(|d| d.message).unwrap_or(error.message);
        return Err(Error::Remote {
            method: method.to_string(),
            message,
        });
    }
    response
        .result
        .ok_or_else(|| Error::InvalidResponse(format!("{method}: neither result nor error")))
}

fn int_field(row: &Map<String, Value>, field: &str) -> Result<i64> {
    row.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::InvalidResponse(format!("missing integer field '{field}'")))
}

/// Many2one fields come back as `[id, "display name"]` or `false`.
fn many2one_id(value: &Value) -> Option<i64> {
    match value {
        Value::Array(pair) => pair.first().and_then(Value::as_i64),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;

    type Route = fn(&Value) -> Value;

    /// Serve canned JSON-RPC replies on a local port.
    ///
    /// `route` maps request params to the `result` value; every request's
    /// params are recorded.
    fn fake_instance(route: Route) -> (String, Arc<Mutex<Vec<Value>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let log = Arc::clone(&log);
                thread::spawn(move || serve(stream, route, &log));
            }
        });
        (url, seen)
    }

    fn serve(stream: TcpStream, route: Route, log: &Mutex<Vec<Value>>) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        while let Some(body) = read_request(&mut reader) {
            let request: Value = serde_json::from_slice(&body).unwrap();
            log.lock().unwrap().push(request["params"].clone());
            let reply = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": route(&request["params"]),
            })
            .to_string();
            let written = write!(
                writer,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                reply.len(),
                reply
            );
            if written.and_then(|()| writer.flush()).is_err() {
                return;
            }
        }
    }

    fn read_request(reader: &mut impl BufRead) -> Option<Vec<u8>> {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let mut content_length = 0;
        let mut chunked = false;
        loop {
            line.clear();
            reader.read_line(&mut line).ok()?;
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            let (name, value) = header.split_once(':')?;
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok()?;
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                chunked = value.eq_ignore_ascii_case("chunked");
            }
        }

        let mut body = Vec::new();
        if chunked {
            loop {
                line.clear();
                reader.read_line(&mut line).ok()?;
                let size_hex = line.trim_end().split(';').next().unwrap_or_default();
                let size = usize::from_str_radix(size_hex, 16).ok()?;
                let mut chunk = vec![0; size];
                reader.read_exact(&mut chunk).ok()?;
                body.extend(chunk);
                line.clear();
                reader.read_line(&mut line).ok()?;
                if size == 0 {
                    break;
                }
            }
        } else {
            body.resize(content_length, 0);
            reader.read_exact(&mut body).ok()?;
        }
        Some(body)
    }

    /// A small instance: module `stock`, user `admin` in company 1 and the
    /// group `stock.group_stock_manager`. Everything else is unknown.
    fn route(params: &Value) -> Value {
        if params["service"] == "common" {
            return json!(2);
        }
        let args = &params["args"];
        let model = args[3].as_str().unwrap_or_default();
        let method = args[4].as_str().unwrap_or_default();
        // First domain term's value: [[["field", "=", value], ...]]
        let needle = &args[5][0][0][2];
        match (model, method) {
            ("ir.module.module", "search_read") if needle == "stock" => {
                json!([{ "id": 10, "name": "stock", "state": "installed" }])
            }
            ("res.users", "search_read") if needle == "admin" => json!([{
                "id": 2,
                "login": "admin",
                "groups_id": [1, 7],
                "company_id": [1, "My Company"],
            }]),
            ("ir.model.data", "search_read") if needle == "stock" => json!([{ "id": 99, "res_id": 31 }]),
            (_, "search_read") => json!([]),
            _ => Value::Null,
        }
    }

    fn connect(url: &str) -> JsonRpcAdmin {
        JsonRpcAdmin::connect(url, "prod", "admin", "secret").unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(endpoint("http://localhost:8069/"), "http://localhost:8069/jsonrpc");
        assert_eq!(endpoint("http://localhost:8069"), "http://localhost:8069/jsonrpc");
    }

    #[test]
    fn test_request_shape() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service: "object",
                method: "execute_kw",
                args: execute_kw_args(
                    "prod",
                    2,
                    "secret",
                    "res.users",
                    "write",
                    json!([[7], { "groups_id": [[4, 12]] }]),
                    json!({}),
                ),
            },
            id: 5,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "call",
                "params": {
                    "service": "object",
                    "method": "execute_kw",
                    "args": ["prod", 2, "secret", "res.users", "write",
                             [[7], { "groups_id": [[4, 12]] }], {}]
                },
                "id": 5
            })
        );
    }

    #[test]
    fn test_error_payload_prefers_data_message() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": { "name": "odoo.exceptions.AccessError", "message": "Access denied" }
            }
        }))
        .unwrap();

        let err = into_result(response, "execute_kw").unwrap_err();
        assert!(matches!(err, Error::Remote { ref message, .. } if message == "Access denied"));
    }

    #[test]
    fn test_result_payload() {
        let response: RpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": 42 })).unwrap();
        assert_eq!(into_result(response, "login").unwrap(), json!(42));
    }

    #[test]
    fn test_empty_payload_is_invalid() {
        let response: RpcResponse = serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1 })).unwrap();
        assert!(matches!(
            into_result(response, "login"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_many2one_id() {
        assert_eq!(many2one_id(&json!([3, "My Company"])), Some(3));
        assert_eq!(many2one_id(&json!(false)), None);
        assert_eq!(many2one_id(&json!(9)), Some(9));
    }

    #[test]
    fn test_unreachable_instance_is_http_error() {
        let err = JsonRpcAdmin::connect("http://127.0.0.1:1", "prod", "admin", "admin")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_null_result_is_success() {
        let response: RpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 3, "result": null })).unwrap();
        assert_eq!(into_result(response, "execute_kw").unwrap(), Value::Null);
    }

    #[test]
    fn test_connect_authenticates() {
        let (url, seen) = fake_instance(route);
        let admin = connect(&url);
        assert_eq!(admin.uid, 2);

        let login = seen.lock().unwrap()[0].clone();
        assert_eq!(login["service"], "common");
        assert_eq!(login["method"], "login");
        assert_eq!(login["args"], json!(["prod", "admin", "secret"]));
    }

    #[test]
    fn test_rejected_login_is_auth_failure() {
        fn refuse(_: &Value) -> Value {
            json!(false)
        }
        let (url, _) = fake_instance(refuse);
        let err = JsonRpcAdmin::connect(&url, "prod", "admin", "wrong").err().unwrap();
        assert!(matches!(err, Error::AuthFailed { .. }));
    }

    #[test]
    fn test_find_module_over_rpc() {
        let (url, _) = fake_instance(route);
        let admin = connect(&url);

        let module = admin.find_module("stock").unwrap().unwrap();
        assert_eq!(module.id, 10);
        assert_eq!(module.state, ModuleState::Installed);
        assert!(admin.find_module("l10n_nope").unwrap().is_none());
    }

    #[test]
    fn test_find_user_over_rpc() {
        let (url, _) = fake_instance(route);
        let admin = connect(&url);

        let user = admin.find_user("admin").unwrap().unwrap();
        assert_eq!(user.id, 2);
        assert_eq!(user.group_ids, vec![1, 7]);
        assert_eq!(user.company_id, Some(1));
        assert!(admin.find_user("ghost").unwrap().is_none());
    }

    #[test]
    fn test_resolve_group_over_rpc() {
        let (url, _) = fake_instance(route);
        let admin = connect(&url);

        assert_eq!(admin.resolve_group("stock.group_stock_manager").unwrap(), Some(31));
        assert_eq!(admin.resolve_group("base.group_nope").unwrap(), None);
        assert_eq!(admin.resolve_group("no_dot").unwrap(), None);
    }

    #[test]
    fn test_load_chart_template_over_rpc() {
        let (url, seen) = fake_instance(route);
        let admin = connect(&url);

        // try_loading replies with a null result
        admin.load_chart_template(5, Some(1)).unwrap();

        let requests = seen.lock().unwrap().clone();
        let calls: Vec<(&str, &str)> = requests
            .iter()
            .skip(1)
            .map(|p| (p["args"][3].as_str().unwrap(), p["args"][4].as_str().unwrap()))
            .collect();
        // The company is not bound beforehand
        assert_eq!(calls, vec![("account.chart.template", "try_loading")]);

        let load = requests.last().unwrap();
        assert_eq!(load["args"][5], json!([[5]]));
        assert_eq!(load["args"][6], json!({ "context": { "allowed_company_ids": [1] } }));
    }
}
