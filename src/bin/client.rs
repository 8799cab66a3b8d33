use std::env;

use anyhow::Result;
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use kitchen_market::config::DEFAULT_SERVER_ADDR;
use kitchen_market::protocol::{encode, ClientRequest, ServerResponse};

const HELP: &str = "Commands:
  login <user_id> <display name>
  kitchen <kitchen name>
  orders <viewport width> | next | prev
  status <order_id> <Process|Dispatch|Delivered|Rejected>
  pay <order_id>
  chat <seller_id> <buyer_id> <buyer name>
  open <thread_id> | close
  raw <json request>
  exit
Anything else is sent as a message to the open thread.";

/// Turn one line of user input into a request. `None` for blank input or
/// commands missing their arguments.
fn parse_command(input: &str) -> Option<ClientRequest> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let parts: Vec<&str> = input.split_whitespace().collect();
    let rest = |from: usize| parts[from..].join(" ");

    let request = match parts[0].to_lowercase().as_str() {
        "login" if parts.len() >= 2 => ClientRequest::Login {
            user_id: parts[1].to_string(),
            display_name: if parts.len() > 2 { rest(2) } else { parts[1].to_string() },
        },
        "kitchen" if parts.len() >= 2 => ClientRequest::RegisterKitchen {
            kitchen_name: rest(1),
        },
        "orders" => ClientRequest::OpenOrders {
            viewport_width: parts.get(1).and_then(|w| w.parse().ok()).unwrap_or(1024),
        },
        "next" => ClientRequest::NextPage,
        "prev" => ClientRequest::PrevPage,
        "status" if parts.len() == 3 => ClientRequest::SetOrderStatus {
            order_id: parts[1].to_string(),
            status: parts[2].to_string(),
        },
        "pay" if parts.len() == 2 => ClientRequest::ConfirmPayment {
            order_id: parts[1].to_string(),
        },
        "chat" if parts.len() >= 3 => ClientRequest::ResolveThread {
            seller_id: parts[1].to_string(),
            buyer_id: parts[2].to_string(),
            buyer_name: rest(3),
        },
        "open" => ClientRequest::OpenThread {
            thread_id: parts.get(1).map(|id| id.to_string()),
        },
        "close" => ClientRequest::CloseThread,
        "raw" if parts.len() >= 2 => {
            let json = input[3..].trim();
            return serde_json::from_str(json).ok();
        }
        "login" | "kitchen" | "status" | "pay" | "chat" | "raw" => return None,
        _ => ClientRequest::SendMessage {
            text: input.to_string(),
        },
    };
    Some(request)
}

fn print_response(response: ServerResponse) {
    match response {
        ServerResponse::Prompt(msg) => println!("{}", msg),
        ServerResponse::Success(msg) => println!("Success: {}", msg),
        ServerResponse::Error(msg) => println!("Error: {}", msg),
        ServerResponse::Idle => {}
        ServerResponse::OrderPlaced { order_id } => println!("Order placed: {}", order_id),
        ServerResponse::Orders(page) => {
            println!("--- {} order(s) ---", page.orders.len());
            for order in &page.orders {
                let actions: Vec<String> = order
                    .available_actions(page.dispatch_controls)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!(
                    "{} [{}] {} for {}, {}: total {} ({}) -> {}",
                    order.id,
                    order.order_ref_id,
                    order.status,
                    order.customer.username,
                    order.customer.address,
                    order
                        .total()
                        .map_or_else(|| "n/a".to_string(), |total| total.to_string()),
                    order.payment_method,
                    actions.join(" / ")
                );
            }
            println!(
                "{}{}",
                if page.can_prev { "[prev] " } else { "" },
                if page.has_more { "[next]" } else { "" }
            );
        }
        ServerResponse::Thread(link) => println!(
            "Chat with {} ready: open {}",
            link.buyer_name, link.thread_id
        ),
        ServerResponse::Messages { thread_id, messages } => {
            println!("--- {} ---", thread_id);
            for msg in messages {
                println!("{}: {}", msg.sender_id, msg.text);
            }
        }
        ServerResponse::MessageSent { .. } => {}
    }
}

pub async fn run_client(addr: &str) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    println!("Connected to {}", addr);

    let (reader, mut writer) = tokio::io::split(stream);

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<ServerResponse>(&line) {
                Ok(response) => print_response(response),
                Err(_) => println!("Invalid response: {}", line),
            }
        }
        println!("Server disconnected");
        Ok::<(), anyhow::Error>(())
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    while let Some(input) = stdin.next_line().await? {
        if input.trim().eq_ignore_ascii_case("exit") {
            println!("Exiting client...");
            break;
        }
        match parse_command(&input) {
            Some(request) => writer.write_all(encode(&request)?.as_bytes()).await?,
            None if input.trim().is_empty() => {}
            None => println!("{}", HELP),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| env::var("SERVER_ADDR").unwrap_or(DEFAULT_SERVER_ADDR.to_string()));

    run_client(&addr).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_with_and_without_name() {
        assert_eq!(
            parse_command("login u1 Lakshmi Devi"),
            Some(ClientRequest::Login {
                user_id: "u1".into(),
                display_name: "Lakshmi Devi".into()
            })
        );
        assert_eq!(
            parse_command("login u1"),
            Some(ClientRequest::Login {
                user_id: "u1".into(),
                display_name: "u1".into()
            })
        );
    }

    #[test]
    fn test_paging_commands() {
        assert_eq!(
            parse_command("orders 375"),
            Some(ClientRequest::OpenOrders { viewport_width: 375 })
        );
        assert_eq!(
            parse_command("orders"),
            Some(ClientRequest::OpenOrders { viewport_width: 1024 })
        );
        assert_eq!(parse_command("NEXT"), Some(ClientRequest::NextPage));
        assert_eq!(parse_command("prev"), Some(ClientRequest::PrevPage));
    }

    #[test]
    fn test_incomplete_commands_are_rejected() {
        assert_eq!(parse_command("status o1"), None);
        assert_eq!(parse_command("chat seller"), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_plain_text_becomes_message() {
        assert_eq!(
            parse_command("is the thali ready?"),
            Some(ClientRequest::SendMessage {
                text: "is the thali ready?".into()
            })
        );
    }

    #[test]
    fn test_raw_json_request() {
        assert_eq!(
            parse_command(r#"raw {"OpenThread":{"thread_id":"t1"}}"#),
            Some(ClientRequest::OpenThread {
                thread_id: Some("t1".into())
            })
        );
    }
}
