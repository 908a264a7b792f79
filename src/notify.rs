// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Notifier
//!
//! Renders user-facing notifications and hands them to the outbound delivery
//! sink. Delivery itself is external: the notifier pushes fully rendered
//! [`OutboundMessage`]s into an mpsc channel and whatever consumes the
//! receiver (an SMTP relay, the Gmail API adapter, the logging sink shipped
//! with this binary) owns transport.
//!
//! Replies carry the correlation thread id of the triggering email so they
//! land in the same conversation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{Asset, EmailAddress, TransferIntent};

const SIGNATURE: &str = "---\nEmailPay - Email-Native PYUSD Wallet";

/// A rendered notification awaiting delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub to: EmailAddress,
    pub subject: String,
    pub body: String,
    /// Conversation to reply into, when the notification answers an email.
    pub thread_id: Option<String>,
}

/// Template renderer in front of the outbound delivery channel.
#[derive(Clone)]
pub struct Notifier {
    outbox: mpsc::UnboundedSender<OutboundMessage>,
    frontend_url: String,
    expiry_minutes: i64,
}

impl Notifier {
    /// Create a notifier and the receiver end of its outbox.
    pub fn channel(
        frontend_url: String,
        expiry_minutes: i64,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                outbox: tx,
                frontend_url,
                expiry_minutes,
            },
            rx,
        )
    }

    fn push(&self, to: &EmailAddress, subject: &str, body: String, thread_id: Option<&str>) {
        let message = OutboundMessage {
            to: to.clone(),
            subject: subject.to_string(),
            body,
            thread_id: thread_id.map(str::to_string),
        };
        if self.outbox.send(message).is_err() {
            // The sink owning the receiver is gone; surface loudly, a user
            // notification is about to be lost.
            tracing::error!(to = %to, subject = %subject, "Outbound sink closed, notification dropped");
        }
    }

    /// Wallet created (or code resent): deliver the verification code.
    pub fn wallet_created(&self, email: &EmailAddress, otp_code: &str) {
        let body = format!(
            "Welcome to EmailPay!\n\n\
             Your wallet has been created successfully. Please verify your email address to activate your wallet.\n\n\
             Your verification code: {otp_code}\n\n\
             Visit {}/verify?email={email} to complete verification.\n\n\
             {SIGNATURE}",
            self.frontend_url
        );
        self.push(email, "EmailPay - Verify Your Wallet", body, None);
    }

    /// Invite a recipient without a wallet to onboard and claim a transfer.
    pub fn onboarding_invite(
        &self,
        recipient: &EmailAddress,
        onboarding_url: &str,
        sender: &EmailAddress,
        amount: f64,
        asset: Asset,
    ) {
        let body = format!(
            "Hello!\n\n\
             {sender} wants to send you {amount} {asset} via EmailPay.\n\n\
             To receive this payment, you need to create your EmailPay wallet:\n\n\
             {onboarding_url}\n\n\
             This link will expire in {} minutes.\n\n\
             After you verify your wallet, the payment will be automatically processed.\n\n\
             {SIGNATURE}",
            self.expiry_minutes
        );
        self.push(recipient, "EmailPay - You Have a Pending Payment!", body, None);
    }

    /// Tell a sender their transfer is parked on recipient onboarding.
    pub fn pending_notice(
        &self,
        sender: &EmailAddress,
        recipient: &EmailAddress,
        amount: f64,
        asset: Asset,
    ) {
        let body = format!(
            "Payment Initiated\n\n\
             Your payment of {amount} {asset} to {recipient} has been initiated.\n\n\
             The recipient needs to create and verify their EmailPay wallet before the payment can be completed.\n\n\
             We've sent them an onboarding link. The payment will be automatically processed once they verify their wallet.\n\n\
             This pending transaction will expire in {} minutes.\n\n\
             {SIGNATURE}",
            self.expiry_minutes
        );
        self.push(
            sender,
            "EmailPay - Payment Pending Recipient Verification",
            body,
            None,
        );
    }

    /// Reject an email command, echoing the reason and the expected format.
    pub fn invalid_command(&self, to: &EmailAddress, reason: &str, thread_id: Option<&str>) {
        let body = format!(
            "Invalid Command\n\n\
             Your email command could not be processed.\n\n\
             Error: {reason}\n\n\
             Valid command format:\n\
             SEND <amount> ETH|PYUSD TO <recipient_email>\n\n\
             Examples:\n\
             - SEND 10 PYUSD TO alice@example.com\n\
             - SEND 25.5 PYUSD TO bob@gmail.com\n\n\
             Please try again with the correct format.\n\n\
             {SIGNATURE}"
        );
        self.push(to, "EmailPay - Invalid Command", body, thread_id);
    }

    /// Settlement succeeded: receipt details for either party.
    pub fn transfer_success(&self, to: &EmailAddress, intent: &TransferIntent, thread_id: Option<&str>) {
        let (settlement_id, block, explorer_url) = match &intent.receipt {
            Some(receipt) => (
                receipt.settlement_id.clone(),
                receipt.confirmation_ref.to_string(),
                receipt.explorer_url.clone(),
            ),
            None => ("unknown".to_string(), "unknown".to_string(), String::new()),
        };

        let body = format!(
            "Transaction Completed Successfully!\n\n\
             Details:\n\
             - From: {}\n\
             - To: {}\n\
             - Amount: {} {}\n\
             - Network: Ethereum Sepolia (Chain ID: {})\n\
             - Transaction Hash: {settlement_id}\n\
             - Block Number: {block}\n\n\
             View on Explorer: {explorer_url}\n\n\
             {SIGNATURE}",
            intent.sender, intent.recipient, intent.amount, intent.asset, intent.chain_id
        );
        self.push(to, "EmailPay - Transaction Successful", body, thread_id);
    }

    /// Settlement failed: reason and intent details, sender only.
    pub fn transfer_failure(
        &self,
        sender: &EmailAddress,
        reason: &str,
        intent: &TransferIntent,
        thread_id: Option<&str>,
    ) {
        let body = format!(
            "Transaction Failed\n\n\
             Your transaction could not be completed.\n\n\
             Error: {reason}\n\n\
             Transaction Details:\n\
             - From: {}\n\
             - To: {}\n\
             - Amount: {} {}\n\
             - Transaction ID: {}\n\n\
             Please try again or contact support if the issue persists.\n\n\
             {SIGNATURE}",
            intent.sender, intent.recipient, intent.amount, intent.asset, intent.intent_id
        );
        self.push(sender, "EmailPay - Transaction Failed", body, thread_id);
    }
}

/// Default outbox consumer: logs every rendered notification. Stands in for
/// a real delivery adapter in deployments without one.
pub async fn run_log_sink(
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            message = rx.recv() => {
                match message {
                    Some(message) => {
                        tracing::info!(
                            to = %message.to,
                            subject = %message.subject,
                            thread_id = ?message.thread_id,
                            body_len = message.body.len(),
                            "Outbound notification"
                        );
                    }
                    None => return,
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("Notification sink shutting down");
                return;
            }
        }
    }
}
