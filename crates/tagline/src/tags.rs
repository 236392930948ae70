//! Built-in tags.
//!
//! Every name the logger understands out of the box is listed here as a
//! constant, together with the resolver that renders it. Parameterized tags
//! are registered under their prefix (`header`, `query`, ...) and receive the
//! text after the colon as their parameter.
//!
//! Missing values are never errors: a header, cookie or local that is not
//! present renders as nothing.

use std::sync::Arc;

use http::header::{HeaderName, REFERER, USER_AGENT};

use crate::buffer::LineBuffer;
use crate::color::{ColorScheme, COLOR_TAGS};
use crate::data::Data;
use crate::error::Result;
use crate::exchange::{format_local, REQUEST_ID_KEY};
use crate::registry::{Resolver, SharedResolver, TagRegistry};

pub const PID: &str = "pid";
pub const TIME: &str = "time";
pub const REQUEST_ID: &str = "requestid";
pub const REFERER_TAG: &str = "referer";
pub const PROTOCOL: &str = "protocol";
pub const PORT: &str = "port";
pub const IP: &str = "ip";
pub const IPS: &str = "ips";
pub const HOST: &str = "host";
pub const METHOD: &str = "method";
pub const PATH: &str = "path";
pub const URL: &str = "url";
pub const UA: &str = "ua";
pub const LATENCY: &str = "latency";
pub const STATUS: &str = "status";
pub const BODY: &str = "body";
pub const RES_BODY: &str = "resBody";
pub const REQ_HEADERS: &str = "reqHeaders";
pub const QUERY_PARAMS: &str = "queryParams";
pub const BYTES_SENT: &str = "bytesSent";
pub const BYTES_RECEIVED: &str = "bytesReceived";
pub const ROUTE: &str = "route";
pub const ERROR: &str = "error";

pub const HEADER: &str = "header";
pub const REQ_HEADER: &str = "reqHeader";
pub const RESP_HEADER: &str = "respHeader";
pub const QUERY: &str = "query";
pub const FORM: &str = "form";
pub const COOKIE: &str = "cookie";
pub const LOCALS: &str = "locals";

/// Prefixes of the parameterized tag families.
pub const PARAM_PREFIXES: [&str; 7] = [HEADER, REQ_HEADER, RESP_HEADER, QUERY, FORM, COOKIE, LOCALS];

/// Width the latency column is padded to.
pub const LATENCY_WIDTH: usize = 13;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Installs every built-in tag.
///
/// Color tags always render the scheme's codes. `colored` decides whether
/// `status`, `method` and `error` are wrapped in colors.
pub(crate) fn install(registry: &mut TagRegistry, scheme: &ColorScheme, colored: bool) {
    let mut add = |name: &str, resolver: SharedResolver| registry.install_builtin(name, resolver);

    add(PID, shared(pid));
    add(TIME, shared(time));
    add(REQUEST_ID, shared(request_id));
    add(REFERER_TAG, shared(referer));
    add(PROTOCOL, shared(protocol));
    add(PORT, shared(port));
    add(IP, shared(ip));
    add(IPS, shared(ips));
    add(HOST, shared(host));
    add(PATH, shared(path));
    add(URL, shared(url));
    add(UA, shared(user_agent));
    add(LATENCY, shared(latency));
    add(BODY, shared(body));
    add(RES_BODY, shared(response_body));
    add(REQ_HEADERS, shared(request_headers));
    add(QUERY_PARAMS, shared(query_params));
    add(BYTES_SENT, shared(bytes_sent));
    add(BYTES_RECEIVED, shared(bytes_received));
    add(ROUTE, shared(route));

    add(HEADER, shared(request_header));
    add(REQ_HEADER, shared(request_header));
    add(RESP_HEADER, shared(response_header));
    add(QUERY, shared(query));
    add(FORM, shared(form));
    add(COOKIE, shared(cookie));
    add(LOCALS, shared(local));

    if colored {
        let colors = scheme.clone();
        add(STATUS, ignore_param(move |out, data| {
            write!(
                out,
                "{}{:3}{}",
                colors.status_color(data.status),
                data.status.as_u16(),
                colors.reset
            )
        }));
        let colors = scheme.clone();
        add(METHOD, ignore_param(move |out, data| {
            write!(
                out,
                "{}{}{}",
                colors.method_color(data.method),
                data.method,
                colors.reset
            )
        }));
        let colors = scheme.clone();
        add(ERROR, ignore_param(move |out, data| match data.error {
            Some(err) => write!(out, "{}{}{}", colors.red, err, colors.reset),
            None => Ok(0),
        }));
    } else {
        add(STATUS, shared(status));
        add(METHOD, shared(method));
        add(ERROR, shared(error));
    }

    for name in COLOR_TAGS {
        let code = scheme.by_name(name).unwrap_or_default().to_string();
        add(name, ignore_param(move |out, _| out.write_str(&code)));
    }
}

fn shared<R: Resolver + 'static>(resolver: R) -> SharedResolver {
    Arc::new(resolver)
}

fn ignore_param<F>(f: F) -> SharedResolver
where
    F: Fn(&mut LineBuffer, &Data<'_>) -> Result<usize> + Send + Sync + 'static,
{
    Arc::new(move |out: &mut LineBuffer, data: &Data<'_>, _: &str| f(out, data))
}

fn optional(out: &mut LineBuffer, value: Option<&str>) -> Result<usize> {
    value.map_or(Ok(0), |v| out.write_str(v))
}

fn pid(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    write!(out, "{}", data.pid)
}

fn time(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.timestamp)
}

fn request_id(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    data.local(REQUEST_ID_KEY)
        .map_or(Ok(0), |value| format_local(value, out))
}

fn referer(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    optional(out, data.request_header(REFERER.as_str()))
}

fn protocol(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.protocol)
}

fn port(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    data.remote_addr
        .map_or(Ok(0), |addr| write!(out, "{}", addr.port()))
}

fn ip(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    data.remote_addr
        .map_or(Ok(0), |addr| write!(out, "{}", addr.ip()))
}

fn ips(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    optional(out, data.request_header(X_FORWARDED_FOR.as_str()))
}

fn host(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.host())
}

fn method(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.method.as_str())
}

fn path(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.path())
}

fn url(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.original_url())
}

fn user_agent(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    optional(out, data.request_header(USER_AGENT.as_str()))
}

fn latency(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_padded(LATENCY_WIDTH, format_args!("{:?}", data.latency))
}

fn status(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    write!(out, "{}", data.status.as_u16())
}

fn body(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_bytes(data.request_body)
}

fn response_body(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_bytes(data.response_body)
}

/// `Name=v1,v2` per header, joined by `&`. Names are title-cased.
fn request_headers(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    let mut written = 0;
    for (i, name) in data.request_headers.keys().enumerate() {
        if i > 0 {
            written += out.write_str("&")?;
        }
        written += write_title_case(out, name.as_str())?;
        written += out.write_str("=")?;
        for (j, value) in data.request_headers.get_all(name).iter().enumerate() {
            if j > 0 {
                written += out.write_str(",")?;
            }
            written += out.write_bytes(value.as_bytes())?;
        }
    }
    Ok(written)
}

fn write_title_case(out: &mut LineBuffer, name: &str) -> Result<usize> {
    let mut written = 0;
    for (i, part) in name.split('-').enumerate() {
        if i > 0 {
            written += out.write_str("-")?;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            written += write!(out, "{}", first.to_ascii_uppercase())?;
            written += out.write_str(chars.as_str())?;
        }
    }
    Ok(written)
}

fn query_params(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.query())
}

fn bytes_sent(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    write!(out, "{}", data.bytes_sent)
}

fn bytes_received(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    write!(out, "{}", data.bytes_received)
}

fn route(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    out.write_str(data.route)
}

fn error(out: &mut LineBuffer, data: &Data<'_>, _: &str) -> Result<usize> {
    match data.error {
        Some(err) => write!(out, "{}", err),
        None => Ok(0),
    }
}

fn request_header(out: &mut LineBuffer, data: &Data<'_>, name: &str) -> Result<usize> {
    optional(out, data.request_header(name))
}

fn response_header(out: &mut LineBuffer, data: &Data<'_>, name: &str) -> Result<usize> {
    optional(out, data.response_header(name))
}

fn query(out: &mut LineBuffer, data: &Data<'_>, name: &str) -> Result<usize> {
    optional(out, data.query_param(name).as_deref())
}

fn form(out: &mut LineBuffer, data: &Data<'_>, name: &str) -> Result<usize> {
    optional(out, data.form_value(name).as_deref())
}

fn cookie(out: &mut LineBuffer, data: &Data<'_>, name: &str) -> Result<usize> {
    optional(out, data.cookie(name))
}

fn local(out: &mut LineBuffer, data: &Data<'_>, key: &str) -> Result<usize> {
    data.local(key).map_or(Ok(0), |value| format_local(value, out))
}
