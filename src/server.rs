use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::feed::MessageFeed;
use crate::models::Message;
use crate::orders::OrderBook;
use crate::pager::{BackPaging, OrderPager};
use crate::protocol::{encode, ClientRequest, ServerResponse};
use crate::session::{register_kitchen, SellerContext, Session};
use crate::store::DocumentStore;
use crate::thread::ThreadResolver;

const GREETING: &str = "Send Login {user_id, display_name} to start. Sellers: RegisterKitchen, OpenOrders, NextPage, PrevPage, SetOrderStatus, ResolveThread. Everyone: PlaceOrder, OpenThread, SendMessage, CloseThread";

pub struct Server {
    store: DocumentStore,
    back_paging: BackPaging,
}

impl Server {
    pub fn new(store: DocumentStore, back_paging: BackPaging) -> Self {
        Server { store, back_paging }
    }

    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        log::info!("Market server listening on {}", listener.local_addr()?);

        loop {
            let (socket, addr) = listener.accept().await?;
            log::info!("New connection: {}", addr);

            let conn = Connection::new(self.store.clone(), self.back_paging);
            tokio::spawn(async move {
                if let Err(e) = handle_client(socket, conn).await {
                    log::warn!("Error handling client {}: {}", addr, e);
                }
                log::info!("Connection closed: {}", addr);
            });
        }
    }
}

async fn handle_client(socket: TcpStream, mut conn: Connection) -> Result<()> {
    let (reader, mut socket_write) = tokio::io::split(socket);
    let mut lines = BufReader::new(reader).lines();
    let (tx, mut rx) = mpsc::channel::<ServerResponse>(100);

    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            socket_write.write_all(encode(&response)?.as_bytes()).await?;
            socket_write.flush().await?;
        }
        Ok::<(), anyhow::Error>(())
    });

    tx.send(ServerResponse::Prompt(GREETING.to_string())).await?;

    let outcome = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let response = conn.handle_line(&line).await;
                    if tx.send(response).await.is_err() {
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            },
            Some((thread_id, messages)) = conn.feed_changed() => {
                if tx.send(ServerResponse::Messages { thread_id, messages }).await.is_err() {
                    break Ok(());
                }
            }
        }
    };

    conn.close_views().await;
    drop(tx);
    writer.await??;
    outcome
}

/// Per-socket view state: who is logged in and what they are looking at.
struct Connection {
    store: DocumentStore,
    back_paging: BackPaging,
    session: Option<Session>,
    seller: Option<SellerContext>,
    pager: Option<OrderPager>,
    feed: Option<MessageFeed>,
}

impl Connection {
    fn new(store: DocumentStore, back_paging: BackPaging) -> Self {
        Connection {
            store,
            back_paging,
            session: None,
            seller: None,
            pager: None,
            feed: None,
        }
    }

    async fn close_views(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.close().await;
        }
        self.pager = None;
    }

    /// Next window pushed to the open chat thread, if any.
    async fn feed_changed(&mut self) -> Option<(String, Vec<Message>)> {
        let feed = match self.feed.as_mut() {
            Some(feed) => feed,
            None => return std::future::pending().await,
        };
        let messages = feed.changed().await?.to_vec();
        let thread_id = feed.thread_id()?.to_string();
        Some((thread_id, messages))
    }

    async fn handle_line(&mut self, line: &str) -> ServerResponse {
        match serde_json::from_str::<ClientRequest>(line) {
            Ok(request) => {
                log::debug!("Request: {:?}", request);
                self.handle(request).await
            }
            Err(e) => ServerResponse::Error(format!("Invalid message format: {}", e)),
        }
    }

    async fn handle(&mut self, request: ClientRequest) -> ServerResponse {
        match self.session.clone() {
            Some(session) => self.handle_as(session, request).await,
            None => match request {
                ClientRequest::Login {
                    user_id,
                    display_name,
                } => self.login(user_id, display_name).await,
                _ => ServerResponse::Error("Not authenticated".to_string()),
            },
        }
    }

    async fn handle_as(&mut self, session: Session, request: ClientRequest) -> ServerResponse {
        match request {
            // Switching user drops the previous user's views.
            ClientRequest::Login {
                user_id,
                display_name,
            } => self.login(user_id, display_name).await,
            ClientRequest::RegisterKitchen { kitchen_name } => {
                if kitchen_name.trim().is_empty() {
                    return ServerResponse::Error("Kitchen name is required".to_string());
                }
                match register_kitchen(&self.store, &session, kitchen_name.trim()).await {
                    Ok(seller) => {
                        let message = format!("Kitchen {} registered", seller.kitchen_name);
                        self.seller = Some(seller);
                        self.pager = None;
                        ServerResponse::Success(message)
                    }
                    Err(e) => idle("registering kitchen", e),
                }
            }
            ClientRequest::PlaceOrder(order) => {
                if order.buyer_id != session.user_id {
                    return ServerResponse::Error("Invalid buyer_id".to_string());
                }
                match OrderBook::new(self.store.clone()).place(order).await {
                    Ok(order_id) => ServerResponse::OrderPlaced { order_id },
                    Err(e) => idle("placing order", e),
                }
            }
            ClientRequest::ConfirmPayment { order_id } => {
                match OrderBook::new(self.store.clone()).confirm_payment(&order_id).await {
                    Ok(()) => ServerResponse::Success(format!("Payment recorded for {}", order_id)),
                    Err(e) => idle("confirming payment", e),
                }
            }
            ClientRequest::OpenOrders { viewport_width } => {
                let Some(seller) = self.seller.clone() else {
                    return ServerResponse::Error("Not a seller".to_string());
                };
                let pager = self
                    .pager
                    .get_or_insert_with(|| OrderPager::new(self.store.clone(), seller, self.back_paging));
                pager.set_viewport_width(viewport_width);
                match pager.init().await {
                    Ok(()) => ServerResponse::Orders(pager.view()),
                    Err(e) => idle("loading orders", e),
                }
            }
            ClientRequest::NextPage => self.turn_page(true).await,
            ClientRequest::PrevPage => self.turn_page(false).await,
            ClientRequest::SetOrderStatus { order_id, status } => {
                let Some(pager) = self.pager.as_mut() else {
                    return ServerResponse::Error("No order feed open".to_string());
                };
                match pager.set_status_str(&order_id, &status).await {
                    Ok(()) => ServerResponse::Orders(pager.view()),
                    Err(e @ Error::UnknownStatus(_)) => ServerResponse::Error(e.to_string()),
                    Err(e) => idle("updating order status", e),
                }
            }
            ClientRequest::ResolveThread {
                seller_id,
                buyer_id,
                buyer_name,
            } => {
                let resolver = ThreadResolver::new(self.store.clone());
                match resolver.resolve(&seller_id, &buyer_id, &buyer_name).await {
                    Ok(Some(link)) => ServerResponse::Thread(link),
                    Ok(None) => ServerResponse::Idle,
                    Err(e) => idle("resolving thread", e),
                }
            }
            ClientRequest::OpenThread { thread_id } => {
                let feed = self
                    .feed
                    .get_or_insert_with(|| MessageFeed::new(self.store.clone(), &session));
                match feed.open(thread_id.as_deref()).await {
                    Ok(()) => match feed.thread_id() {
                        Some(thread_id) => ServerResponse::Messages {
                            thread_id: thread_id.to_string(),
                            messages: feed.messages().to_vec(),
                        },
                        None => ServerResponse::Success("No thread open".to_string()),
                    },
                    Err(e) => idle("opening thread", e),
                }
            }
            ClientRequest::SendMessage { text } => {
                let Some(feed) = self.feed.as_mut() else {
                    return ServerResponse::Idle;
                };
                match feed.send_text(text).await {
                    Ok(Some(message_id)) => ServerResponse::MessageSent { message_id },
                    Ok(None) => ServerResponse::Idle,
                    Err(e) => idle("sending message", e),
                }
            }
            ClientRequest::CloseThread => {
                if let Some(feed) = self.feed.as_mut() {
                    feed.close().await;
                }
                ServerResponse::Success("Thread closed".to_string())
            }
        }
    }

    async fn turn_page(&mut self, forward: bool) -> ServerResponse {
        let Some(pager) = self.pager.as_mut() else {
            return ServerResponse::Error("No order feed open".to_string());
        };
        let moved = if forward {
            pager.next().await
        } else {
            pager.prev().await
        };
        match moved {
            Ok(_) => ServerResponse::Orders(pager.view()),
            Err(e) => idle("paging orders", e),
        }
    }

    async fn login(&mut self, user_id: String, display_name: String) -> ServerResponse {
        if user_id.trim().is_empty() {
            return ServerResponse::Error("user_id is required".to_string());
        }
        self.close_views().await;
        let session = Session::new(user_id, display_name);
        self.seller = match SellerContext::load(&self.store, &session).await {
            Ok(seller) => seller,
            Err(e) => {
                log::error!("Error loading kitchen for {}: {}", session.user_id, e);
                None
            }
        };
        let message = match &self.seller {
            Some(seller) => format!("Logged in as {} ({})", session.display_name, seller.kitchen_name),
            None => format!("Logged in as {}", session.display_name),
        };
        self.session = Some(session);
        ServerResponse::Success(message)
    }
}

/// Store failures never reach the user: log and let the view fall back to idle.
fn idle(action: &str, e: Error) -> ServerResponse {
    log::error!("Error {}: {}", action, e);
    ServerResponse::Idle
}
