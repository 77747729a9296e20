use paxchat_core::{Ballot, Frame, Header};
use paxchat::transport::{read_frame, write_frame, Connection, ConnectionEvent};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

async fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let client = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();
    (client, server)
}

mod framed_read_write {
    use super::*;

    #[tokio::test]
    async fn a_frame_survives_a_real_tcp_round_trip() {
        let (mut client, mut server) = loopback_pair().await;

        let frame = Frame::new(Header::Propose, 0, 1, Ballot::new(1, 0, 0)).with_message("create 7");
        write_frame(&mut client, &frame).await.unwrap();

        let got = read_frame(&mut server).await.unwrap();
        assert_eq!(got, frame);
    }

    #[tokio::test]
    async fn closing_the_peer_is_observed_as_a_short_read() {
        let (client, mut server) = loopback_pair().await;
        drop(client);

        let err = read_frame(&mut server).await;
        assert!(err.is_err());
    }
}

mod connection_actor {
    use super::*;

    #[tokio::test]
    async fn frames_sent_on_one_side_arrive_as_events_on_the_other() {
        let (client, server) = loopback_pair().await;

        let (client_events_tx, _client_events_rx) = mpsc::channel(8);
        let client_conn = Connection::spawn(client, client_events_tx);

        let (server_events_tx, mut server_events_rx) = mpsc::channel(8);
        let _server_conn = Connection::spawn(server, server_events_tx);

        let frame = Frame::new(Header::Ack, 0, 1, Ballot::new(1, 0, 0));
        client_conn.send(frame.clone()).await.unwrap();

        match server_events_rx.recv().await.unwrap() {
            ConnectionEvent::Frame(got) => assert_eq!(got, frame),
            ConnectionEvent::Closed => panic!("expected a frame, not a closure"),
        }
    }

    #[tokio::test]
    async fn closing_a_connection_notifies_the_peer() {
        let (client, server) = loopback_pair().await;

        let (client_events_tx, _client_events_rx) = mpsc::channel(8);
        let client_conn = Connection::spawn(client, client_events_tx);

        let (server_events_tx, mut server_events_rx) = mpsc::channel(8);
        let _server_conn = Connection::spawn(server, server_events_tx);

        client_conn.close();

        let event = server_events_rx.recv().await.unwrap();
        assert!(matches!(event, ConnectionEvent::Closed));
    }
}
